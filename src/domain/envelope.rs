//! Inbound request and outbound response envelopes.
//!
//! These are the JSON shapes exchanged with the application layer:
//!
//! ```json
//! { "mealDescription": "I had 3", "existingData": { "items": [...], "totals": {...} } }
//! { "success": true, "data": { "items": [...], "totals": {...} } }
//! { "success": false, "error": { "kind": "invalid_input", "message": "...", "retryable": false } }
//! ```

use serde::{Deserialize, Serialize};

use super::record::NutritionRecord;
use super::request::MealRequest;
use crate::error::{ErrorKind, InterpretError};

/// Inbound call from the application layer
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub meal_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_data: Option<NutritionRecord>,
}

impl From<InterpretRequest> for MealRequest {
    fn from(request: InterpretRequest) -> Self {
        MealRequest::from_parts(request.meal_description, request.existing_data)
    }
}

/// Failure body with a machine-readable kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&InterpretError> for ErrorBody {
    fn from(err: &InterpretError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Response to the application layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NutritionRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl InterpretResponse {
    pub fn success(data: NutritionRecord) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &InterpretError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

impl From<crate::error::Result<NutritionRecord>> for InterpretResponse {
    fn from(result: crate::error::Result<NutritionRecord>) -> Self {
        match result {
            Ok(record) => Self::success(record),
            Err(e) => Self::failure(&e),
        }
    }
}
