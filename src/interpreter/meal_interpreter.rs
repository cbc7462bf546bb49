//! The meal interpreter: validate, prompt, call, extract, reconcile.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::extract::{ExtractError, extract_record, snippet};
use crate::domain::{InterpretRequest, InterpretResponse, MealRequest, NutritionRecord};
use crate::error::{InterpretError, Result};
use crate::llm::{LlmClient, LlmError};
use crate::prompt::MealPrompt;

/// Default bound on one model round-trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default reply budget; a full record rarely needs more than a few hundred tokens
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Default longest accepted description, in characters
pub const DEFAULT_MAX_DESCRIPTION_CHARS: usize = 2000;

/// Default relative totals drift tolerated before a warning is logged
pub const DEFAULT_TOTALS_TOLERANCE: f64 = 0.05;

/// Tunables for a `MealInterpreter`
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterOptions {
    /// Upper bound on the model call
    pub timeout: Duration,

    /// Reply token budget
    pub max_tokens: u32,

    /// Sampling temperature, provider default when unset
    pub temperature: Option<f32>,

    /// Model override, client default when unset
    pub model: Option<String>,

    /// Longer descriptions are rejected as invalid input
    pub max_description_chars: usize,

    /// Relative drift between stated and summed totals before warning
    pub totals_tolerance: f64,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            model: None,
            max_description_chars: DEFAULT_MAX_DESCRIPTION_CHARS,
            totals_tolerance: DEFAULT_TOTALS_TOLERANCE,
        }
    }
}

/// Converts meal descriptions into nutrition records.
///
/// Holds no mutable state; share it behind an `Arc` and call it from as many
/// tasks as needed.
pub struct MealInterpreter {
    client: Arc<dyn LlmClient>,
    options: InterpreterOptions,
}

impl MealInterpreter {
    /// Create an interpreter with default options
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self::with_options(client, InterpreterOptions::default())
    }

    pub fn with_options(client: Arc<dyn LlmClient>, options: InterpreterOptions) -> Self {
        Self { client, options }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    /// Interpret a new meal or refine a prior record.
    pub async fn interpret(&self, request: MealRequest) -> Result<NutritionRecord> {
        self.validate_request(&request)?;

        let prompt = MealPrompt::for_request(&request)
            .map_err(|e| InterpretError::InvalidInput(format!("existing record could not be serialized: {}", e)))?;

        let mut completion = prompt.into_completion_request(self.options.max_tokens, self.options.temperature);
        completion.model = self.options.model.clone();

        info!(
            "Interpreting meal ({}) with model {}",
            request.mode(),
            completion.model.as_deref().unwrap_or(self.client.model())
        );
        debug!("Meal description: {}", request.description());

        let start = Instant::now();
        let response = tokio::time::timeout(self.options.timeout, self.client.complete(completion))
            .await
            .map_err(|_| LlmError::Timeout(self.options.timeout))??;

        debug!(
            "Model replied in {:?} ({} input / {} output tokens)",
            start.elapsed(),
            response.usage.input_tokens,
            response.usage.output_tokens
        );

        let record = extract_record(&response.content).inspect_err(|e| {
            if response.stop_reason.is_truncated() {
                warn!("Model reply was cut off at the token limit: {}", e);
            } else {
                warn!("Model reply rejected: {}", e);
            }
            debug!("Rejected reply: {}", snippet(&response.content));
        })?;

        Ok(self.reconcile(record)?)
    }

    /// Interpret using the nullable-prior form
    pub async fn interpret_description(
        &self,
        description: &str,
        existing: Option<NutritionRecord>,
    ) -> Result<NutritionRecord> {
        self.interpret(MealRequest::from_parts(description, existing)).await
    }

    /// Interpret, giving up with `Cancelled` if `cancel` resolves first.
    ///
    /// Dropping the pending call aborts the outbound request.
    pub async fn interpret_until<F>(&self, request: MealRequest, cancel: F) -> Result<NutritionRecord>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            result = self.interpret(request) => result,
            _ = cancel => {
                warn!("Interpretation cancelled before the model replied");
                Err(InterpretError::Cancelled)
            }
        }
    }

    /// Serve one inbound envelope; failures become typed error bodies.
    pub async fn handle(&self, request: InterpretRequest) -> InterpretResponse {
        let result = self.interpret(request.into()).await;
        if let Err(e) = &result {
            info!("Interpretation failed ({}): {}", e.kind(), e);
        }
        result.into()
    }

    fn validate_request(&self, request: &MealRequest) -> Result<()> {
        let description = request.description().trim();

        if description.is_empty() {
            return Err(InterpretError::InvalidInput("meal description is empty".to_string()));
        }

        let length = description.chars().count();
        if length > self.options.max_description_chars {
            return Err(InterpretError::InvalidInput(format!(
                "meal description is {} characters, limit is {}",
                length, self.options.max_description_chars
            )));
        }

        if let MealRequest::RefineMeal { prior, .. } = request {
            prior
                .validate()
                .map_err(|msg| InterpretError::InvalidInput(format!("existing record is invalid: {}", msg)))?;
        }

        Ok(())
    }

    /// Replace stated totals with the item sum, warning on large drift.
    ///
    /// Items are individually finite, but their sum can still overflow.
    fn reconcile(&self, record: NutritionRecord) -> std::result::Result<NutritionRecord, ExtractError> {
        let reconciled = record.reconciled();
        if let Some((field, value)) = reconciled.totals.fields().into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ExtractError::InvalidNumber {
                field: format!("totals.{}", field),
                value: value.to_string(),
            });
        }

        let drift = record.totals_drift();
        if drift > self.options.totals_tolerance {
            warn!(
                "Model totals drifted {:.1}% from the item sum; using the item sum",
                drift * 100.0
            );
        }
        Ok(reconciled)
    }
}

impl std::fmt::Debug for MealInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MealInterpreter")
            .field("model", &self.client.model())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FoodItem, Macros};
    use crate::error::ErrorKind;
    use crate::llm::{CompletionResponse, MockLlmClient, StopReason, Usage};

    const APPLE: &str = r#"{"items": [{"food": "apple", "quantity": "1 medium", "macros": {"calories": 95, "protein": 0.5, "carbs": 25, "fat": 0.3}}],
        "totals": {"calories": 95, "protein": 0.5, "carbs": 25, "fat": 0.3}}"#;

    fn interpreter(mock: &MockLlmClient) -> MealInterpreter {
        MealInterpreter::new(Arc::new(mock.clone()))
    }

    fn rice() -> NutritionRecord {
        NutritionRecord::from_items(vec![FoodItem::new("rice", "1 cup", Macros::new(200.0, 4.0, 45.0, 0.4))])
    }

    #[tokio::test]
    async fn test_empty_description_rejected_without_call() {
        let mock = MockLlmClient::with_replies([APPLE]);
        let interpreter = interpreter(&mock);

        for description in ["", "   ", "\n\t"] {
            let err = interpreter.interpret(MealRequest::new_meal(description)).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_overlong_description_rejected() {
        let mock = MockLlmClient::with_replies([APPLE]);
        let mut options = InterpreterOptions::default();
        options.max_description_chars = 10;
        let interpreter = MealInterpreter::with_options(Arc::new(mock.clone()), options);

        let err = interpreter
            .interpret(MealRequest::new_meal("a very long description of lunch"))
            .await
            .unwrap_err();

        assert!(matches!(err, InterpretError::InvalidInput(ref m) if m.contains("limit is 10")));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_prior_rejected() {
        let mock = MockLlmClient::with_replies([APPLE]);
        let prior = NutritionRecord::from_items(vec![]);

        let err = interpreter(&mock)
            .interpret(MealRequest::refine("double it", prior))
            .await
            .unwrap_err();

        assert!(matches!(err, InterpretError::InvalidInput(ref m) if m.contains("no items")));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_new_meal_sends_description() {
        let mock = MockLlmClient::with_replies([APPLE]);

        let record = interpreter(&mock).interpret(MealRequest::new_meal("an apple")).await.unwrap();

        assert_eq!(record.items[0].food, "apple");
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].last_user_message().unwrap().contains("## Meal\n\nan apple"));
        assert_eq!(requests[0].max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert_eq!(requests[0].model, None);
    }

    #[tokio::test]
    async fn test_refinement_sends_prior_record() {
        let mock = MockLlmClient::with_replies([APPLE]);

        interpreter(&mock)
            .interpret(MealRequest::refine("add an apple", rice()))
            .await
            .unwrap();

        let user = mock.requests()[0].last_user_message().unwrap().to_string();
        assert!(user.contains("\"food\": \"rice\""));
        assert!(user.contains("## Modification\n\nadd an apple"));
    }

    #[tokio::test]
    async fn test_model_override_is_forwarded() {
        let mock = MockLlmClient::with_replies([APPLE]);
        let options = InterpreterOptions {
            model: Some("claude-3-5-haiku-20241022".to_string()),
            temperature: Some(0.0),
            ..Default::default()
        };

        MealInterpreter::with_options(Arc::new(mock.clone()), options)
            .interpret(MealRequest::new_meal("an apple"))
            .await
            .unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.model.as_deref(), Some("claude-3-5-haiku-20241022"));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_totals_recomputed_from_items() {
        let drifted = r#"{"items": [
            {"food": "egg", "quantity": "2", "macros": {"calories": 140, "protein": 12, "carbs": 1, "fat": 10}},
            {"food": "toast", "quantity": "1 slice", "macros": {"calories": 80, "protein": 3, "carbs": 14, "fat": 1}}
        ], "totals": {"calories": 300, "protein": 10, "carbs": 10, "fat": 10}}"#;
        let mock = MockLlmClient::with_replies([drifted]);

        let record = interpreter(&mock).interpret(MealRequest::new_meal("2 eggs and toast")).await.unwrap();

        assert_eq!(record.totals, Macros::new(220.0, 15.0, 15.0, 11.0));
        assert_eq!(record.totals_drift(), 0.0);
    }

    #[tokio::test]
    async fn test_overflowing_totals_are_malformed() {
        let huge = r#"{"items": [
            {"food": "lard", "quantity": "1 vat", "macros": {"calories": 1e308, "protein": 0, "carbs": 0, "fat": 1}},
            {"food": "lard", "quantity": "another vat", "macros": {"calories": 1e308, "protein": 0, "carbs": 0, "fat": 1}}
        ], "totals": {"calories": 1e308, "protein": 0, "carbs": 0, "fat": 2}}"#;
        let mock = MockLlmClient::with_replies([huge]);

        let err = interpreter(&mock).interpret(MealRequest::new_meal("two vats of lard")).await.unwrap_err();

        match err {
            InterpretError::MalformedModelOutput(ExtractError::InvalidNumber { field, value }) => {
                assert_eq!(field, "totals.calories");
                assert_eq!(value, "inf");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_reply_is_malformed() {
        let mock = MockLlmClient::new();
        mock.push_response(CompletionResponse {
            content: r#"{"items": [{"food": "apple", "quantity": "1 medium", "macros": {"calories": 95"#.to_string(),
            stop_reason: StopReason::MaxTokens,
            usage: Usage::default(),
        });

        let err = interpreter(&mock).interpret(MealRequest::new_meal("an apple")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_prose_reply_is_malformed() {
        let mock = MockLlmClient::with_replies(["Sorry, I can't help with that."]);

        let err = interpreter(&mock).interpret(MealRequest::new_meal("a rock")).await.unwrap_err();

        assert!(matches!(
            err,
            InterpretError::MalformedModelOutput(ExtractError::NoJsonObject { .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_model_unavailable() {
        let mock = MockLlmClient::failing(LlmError::ApiError {
            status: 502,
            message: "bad gateway".to_string(),
        });

        let err = interpreter(&mock).interpret(MealRequest::new_meal("an apple")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_timeout_is_model_unavailable() {
        let mock = MockLlmClient::with_replies([APPLE]).with_delay(Duration::from_millis(500));
        let interpreter = interpreter(&mock).with_timeout(Duration::from_millis(20));

        let err = interpreter.interpret(MealRequest::new_meal("an apple")).await.unwrap_err();

        assert!(matches!(err, InterpretError::ModelUnavailable(LlmError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let mock = MockLlmClient::with_replies([APPLE]).with_delay(Duration::from_millis(500));
        let interpreter = interpreter(&mock);

        let err = interpreter
            .interpret_until(
                MealRequest::new_meal("an apple"),
                tokio::time::sleep(Duration::from_millis(10)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InterpretError::Cancelled));
    }

    #[tokio::test]
    async fn test_interpret_until_completes_when_not_cancelled() {
        let mock = MockLlmClient::with_replies([APPLE]);

        let record = interpreter(&mock)
            .interpret_until(MealRequest::new_meal("an apple"), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(record.items.len(), 1);
    }

    #[tokio::test]
    async fn test_interpret_description_selects_mode() {
        let mock = MockLlmClient::with_replies([APPLE, APPLE]);
        let interpreter = interpreter(&mock);

        interpreter.interpret_description("an apple", None).await.unwrap();
        interpreter.interpret_description("I had 2", Some(rice())).await.unwrap();

        let requests = mock.requests();
        assert!(!requests[0].last_user_message().unwrap().contains("## Current Record"));
        assert!(requests[1].last_user_message().unwrap().contains("## Current Record"));
    }

    #[tokio::test]
    async fn test_handle_success_and_failure() {
        let mock = MockLlmClient::with_replies([APPLE]);
        let interpreter = interpreter(&mock);

        let ok = interpreter
            .handle(InterpretRequest {
                meal_description: "an apple".to_string(),
                existing_data: None,
            })
            .await;
        assert!(ok.success);
        assert_eq!(ok.data.unwrap().items[0].food, "apple");

        let bad = interpreter
            .handle(InterpretRequest {
                meal_description: " ".to_string(),
                existing_data: None,
            })
            .await;
        assert!(!bad.success);
        assert_eq!(bad.error.unwrap().kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_debug_impl() {
        let debug_str = format!("{:?}", interpreter(&MockLlmClient::new()));
        assert!(debug_str.contains("MealInterpreter"));
        assert!(debug_str.contains("mock-model"));
    }
}
