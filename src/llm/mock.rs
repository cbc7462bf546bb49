//! In-process LLM client returning canned replies.
//!
//! Used by tests and dry runs to exercise the interpreter without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse};

/// Replies are handed out in FIFO order, one per `complete` call.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    replies: Arc<Mutex<VecDeque<Result<CompletionResponse, LlmError>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that answers each call with the next text in `replies`
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for reply in replies {
            mock.push_reply(reply);
        }
        mock
    }

    /// Client whose first call fails with `error`
    pub fn failing(error: LlmError) -> Self {
        let mock = Self::new();
        mock.push_error(error);
        mock
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        lock(&self.replies).push_back(Ok(CompletionResponse::text(text)));
    }

    pub fn push_response(&self, response: CompletionResponse) {
        lock(&self.replies).push_back(Ok(response));
    }

    pub fn push_error(&self, error: LlmError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// Number of `complete` calls made so far
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        lock(&self.requests).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Err(LlmError::InvalidResponse("mock client has no replies left".to_string())))
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order() {
        let mock = MockLlmClient::with_replies(["first", "second"]);

        let a = mock.complete(CompletionRequest::new("sys")).await.unwrap();
        let b = mock.complete(CompletionRequest::new("sys")).await.unwrap();

        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_mock_errors() {
        let mock = MockLlmClient::new();
        let result = mock.complete(CompletionRequest::new("sys")).await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockLlmClient::failing(LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        });
        let result = mock.complete(CompletionRequest::new("sys")).await;
        assert!(matches!(result, Err(LlmError::ApiError { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let mock = MockLlmClient::with_replies(["ok"]);
        let clone = mock.clone();

        mock.complete(CompletionRequest::new("sys").with_user_message("2 eggs"))
            .await
            .unwrap();

        // Clones share state
        let requests = clone.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].last_user_message(), Some("2 eggs"));
    }

    #[test]
    fn test_mock_identity() {
        let mock = MockLlmClient::new();
        assert!(mock.is_ready());
        assert_eq!(mock.model(), "mock-model");
    }
}
