// ABOUTME: Text-generation collaborator abstraction used for workout and diet plan generation
// ABOUTME: One prompt in, one content value out; HTTP route and direct Gemini implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Text Generation
//!
//! The client talks to a text-generation service through a single
//! JSON-in/JSON-out call: `{prompt}` goes out, `{content}` comes back, where
//! `content` is either a string or an already-structured JSON value.
//!
//! - [`HttpTextGenerator`] posts to a generation route
//! - [`GeminiGenerator`] calls the Gemini REST API directly
//! - [`parse_generated_json`] turns model output into a JSON object
//! - [`PlanService`] generates, validates, stamps, and stores a plan
//!
//! ## Example
//!
//! ```rust,no_run
//! use squat_coach::llm::{GenerationRequest, HttpTextGenerator, TextGenerator};
//!
//! async fn example() -> squat_coach::errors::AppResult<()> {
//!     let generator = HttpTextGenerator::new("http://localhost:3000/api/generate-ai-content")?;
//!     let response = generator
//!         .generate(&GenerationRequest::new("Create a 3-day squat program as JSON"))
//!         .await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```

mod gemini;
mod http;
mod parsing;
mod plans;

pub use gemini::GeminiGenerator;
pub use http::HttpTextGenerator;
pub use parsing::{extract_balanced_object, parse_generated_json};
pub use plans::{PlanKind, PlanService, GENERATED_AT_FIELD};

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    /// Prompt text
    pub prompt: String,
    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerationRequest {
    /// Request for `prompt` with the generator's default model
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
        }
    }

    /// Use a specific model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Reject empty prompts before any network call
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the prompt is blank
    pub fn validate(&self) -> AppResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::invalid_input("Prompt is required"));
        }
        Ok(())
    }
}

/// Generated content
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationResponse {
    /// A string or an already-structured JSON value
    pub content: Value,
}

/// A service that turns a prompt into content
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &'static str;

    /// Generate content for `request`
    ///
    /// # Errors
    ///
    /// Returns an external-service error when the call fails
    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationResponse>;
}
