// ABOUTME: PlanService generates workout and diet plans, stamps them, and stores them on success
// ABOUTME: Nothing is written to the store unless the generated content parses as a JSON object
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{parse_generated_json, GenerationRequest, TextGenerator};
use crate::constants::storage;
use crate::errors::{AppError, AppResult};
use crate::store::KeyValueStore;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Field added to every stored plan
pub const GENERATED_AT_FIELD: &str = "generatedAt";

/// Which plan a prompt produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Training program
    Workout,
    /// Meal plan
    Diet,
}

impl PlanKind {
    /// Store key holding the latest plan of this kind
    #[must_use]
    pub const fn store_key(self) -> &'static str {
        match self {
            Self::Workout => storage::WORKOUT_PLAN_KEY,
            Self::Diet => storage::DIET_PLAN_KEY,
        }
    }

    /// Lowercase label for logs and messages
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Workout => "workout",
            Self::Diet => "diet",
        }
    }
}

/// Generates plans and keeps the latest one of each kind
pub struct PlanService {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn KeyValueStore>,
}

impl PlanService {
    /// Service using `generator` and persisting into `store`
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { generator, store }
    }

    /// Generate a plan for `prompt`, stamp it, and store it
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank prompt and `GenerationFailed` when the
    /// call fails or its content is not a JSON object; the store is untouched
    /// in both cases
    pub async fn generate(&self, kind: PlanKind, prompt: &str) -> AppResult<Map<String, Value>> {
        let request = GenerationRequest::new(prompt);
        request.validate()?;

        info!(
            generator = self.generator.name(),
            plan = kind.label(),
            "Generating plan"
        );

        let response = self.generator.generate(&request).await.map_err(|e| {
            warn!(plan = kind.label(), error = %e, "Plan generation call failed");
            AppError::generation_failed(format!(
                "Failed to generate {} plan. Please try again.",
                kind.label()
            ))
            .with_source(e)
        })?;

        let mut plan = parse_generated_json(&response.content).inspect_err(|e| {
            warn!(plan = kind.label(), error = %e, "Generated plan is not valid JSON");
        })?;
        plan.insert(
            GENERATED_AT_FIELD.to_owned(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        self.store
            .set(kind.store_key(), serde_json::to_string(&plan)?)?;
        info!(plan = kind.label(), "Plan stored");
        Ok(plan)
    }

    /// The latest stored plan of `kind`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read or the blob is not JSON
    pub fn latest(&self, kind: PlanKind) -> AppResult<Option<Map<String, Value>>> {
        self.store
            .get(kind.store_key())?
            .map(|raw| serde_json::from_str(&raw).map_err(AppError::from))
            .transpose()
    }
}
