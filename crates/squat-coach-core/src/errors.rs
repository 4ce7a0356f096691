// ABOUTME: Unified error type and error codes shared across the squat coach workspace
// ABOUTME: Maps camera, link, collaborator, and storage failures to structured AppError values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling System
//!
//! Every fallible operation in the client returns [`AppResult`]. Errors carry an
//! [`ErrorCode`] so callers can tell a user-actionable failure (camera permission
//! denied) from a transient one (socket dropped) without string matching.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Media capture (1000-1999)
    #[serde(rename = "MEDIA_ACCESS_DENIED")]
    MediaAccessDenied = 1000,
    #[serde(rename = "MEDIA_UNAVAILABLE")]
    MediaUnavailable = 1001,
    #[serde(rename = "FRAME_ENCODING_FAILED")]
    FrameEncodingFailed = 1002,

    // Link (2000-2999)
    #[serde(rename = "CONNECTION_FAILED")]
    ConnectionFailed = 2000,
    #[serde(rename = "CONNECTION_CLOSED")]
    ConnectionClosed = 2001,
    #[serde(rename = "MALFORMED_MESSAGE")]
    MalformedMessage = 2002,

    // Validation and state (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    #[serde(rename = "INVALID_STATE")]
    InvalidState = 3001,
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 3002,

    // External services (5000-5999)
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError = 5000,
    #[serde(rename = "EXTERNAL_SERVICE_UNAVAILABLE")]
    ExternalServiceUnavailable = 5001,
    #[serde(rename = "GENERATION_FAILED")]
    GenerationFailed = 5002,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6001,

    // Internal (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9001,
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9002,
}

impl ErrorCode {
    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::MediaAccessDenied => {
                "Unable to access your camera. Please check permissions and try again"
            }
            Self::MediaUnavailable => "No camera matching the requested constraints is available",
            Self::FrameEncodingFailed => "The captured frame could not be encoded",
            Self::ConnectionFailed => "Could not connect to the analysis server",
            Self::ConnectionClosed => "The connection to the analysis server is closed",
            Self::MalformedMessage => "The server sent a message that could not be understood",
            Self::InvalidInput => "The provided input is invalid",
            Self::InvalidState => "The operation is not allowed in the current state",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ExternalServiceError => "An external service encountered an error",
            Self::ExternalServiceUnavailable => "An external service is currently unavailable",
            Self::GenerationFailed => "Could not generate content. Please try again",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal error occurred",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }

    /// Whether retrying the same operation later can reasonably succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed
                | Self::ConnectionClosed
                | Self::ExternalServiceError
                | Self::ExternalServiceUnavailable
                | Self::GenerationFailed
        )
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional structured context
    pub details: serde_json::Value,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
            source: None,
        }
    }

    /// Attach structured details to the error
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the failure is transient
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Camera permission was refused
    pub fn media_access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MediaAccessDenied, message)
    }

    /// No usable camera source
    pub fn media_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MediaUnavailable, message)
    }

    /// Frame could not be encoded
    pub fn frame_encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FrameEncodingFailed, message)
    }

    /// Socket could not be opened
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionFailed, message)
    }

    /// Socket is not open
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionClosed, message)
    }

    /// Inbound payload failed to parse
    pub fn malformed_message(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedMessage, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Operation not allowed in the current state
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// Text generation produced nothing usable
    pub fn generation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GenerationFailed, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Configuration value is present but invalid
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::storage(error.to_string()).with_source(error)
    }
}

#[cfg(feature = "transport-errors")]
impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        let code = match &error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ErrorCode::ConnectionClosed,
            _ => ErrorCode::ConnectionFailed,
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}

#[cfg(feature = "transport-errors")]
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        let code = if error.is_timeout() || error.is_connect() {
            ErrorCode::ExternalServiceUnavailable
        } else {
            ErrorCode::ExternalServiceError
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}

#[cfg(feature = "image-errors")]
impl From<image::ImageError> for AppError {
    fn from(error: image::ImageError) -> Self {
        Self::frame_encoding(error.to_string()).with_source(error)
    }
}
