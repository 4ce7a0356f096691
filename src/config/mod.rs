// ABOUTME: Configuration module for the streaming client and its collaborators
// ABOUTME: Re-exports environment-driven detector, generation, and upload settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! - **Environment**: detector, storage, text-generation, and video upload
//!   settings read from environment variables

/// Environment-driven configuration
pub mod environment;

pub use environment::{DetectorConfig, Environment, GenerationConfig, UploadConfig};
