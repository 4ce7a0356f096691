// ABOUTME: Turns text-generation output into a JSON object with a two-stage fallback
// ABOUTME: Direct parse first, then the first balanced {...} span found outside string literals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, AppResult};
use serde_json::{Map, Value};
use tracing::debug;

/// Parse generated content into a JSON object
///
/// Structured content is accepted as is. String content is parsed directly;
/// when that fails (prose around the JSON, markdown fences) the first balanced
/// `{...}` span that parses as an object is used.
///
/// # Errors
///
/// Returns `GenerationFailed` when neither stage yields a JSON object
pub fn parse_generated_json(content: &Value) -> AppResult<Map<String, Value>> {
    match content {
        Value::Object(object) => Ok(object.clone()),
        Value::String(text) => parse_text(text),
        other => Err(AppError::generation_failed(format!(
            "expected an object or text, got {other}"
        ))),
    }
}

fn parse_text(text: &str) -> AppResult<Map<String, Value>> {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(object);
    }

    let mut offset = 0;
    while let Some(start) = text[offset..].find('{').map(|i| offset + i) {
        if let Some(candidate) = extract_balanced_object(&text[start..]) {
            if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) {
                debug!(start, len = candidate.len(), "Recovered JSON object from generated text");
                return Ok(object);
            }
        }
        offset = start + 1;
    }

    Err(AppError::generation_failed(
        "Could not parse AI response as JSON",
    ))
}

/// The balanced `{...}` span starting at the first `{` of `text`
///
/// Braces inside JSON string literals are ignored. Returns `None` when the
/// text has no `{` or the first one is never closed.
#[must_use]
pub fn extract_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + index + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}
