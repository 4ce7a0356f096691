// ABOUTME: Core types and constants for the squat coach streaming client
// ABOUTME: Foundation crate with error handling, protocol constants, and session models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Squat Coach Core
//!
//! Foundation crate providing shared types and constants for the squat coach
//! client. This crate is designed to change infrequently, enabling incremental
//! compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Protocol literals, timings, and storage keys
//! - **models**: Modes, rep counters, feedback events, and workout records

/// Unified error handling system with standard error codes
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Session data models shared by the client and its collaborators
pub mod models;
