//! Mock extraction strategy for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::extractor::{ExtractionResult, ExtractionStrategy};

/// Mock implementation of the [`ExtractionStrategy`] trait.
///
/// Provides controllable behavior for testing:
/// - Return a configurable extraction result
/// - Track attempted URLs for assertions
pub struct MockStrategy {
    name: String,
    /// Result returned by every attempt.
    result: Arc<RwLock<ExtractionResult>>,
    /// Recorded attempt URLs.
    attempts: Arc<RwLock<Vec<String>>>,
}

impl MockStrategy {
    /// Create a mock strategy that always returns an empty result.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: Arc::new(RwLock::new(ExtractionResult::default())),
            attempts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a mock strategy with a predefined result.
    pub fn with_result(name: &str, result: ExtractionResult) -> Self {
        let strategy = Self::new(name);
        *strategy.result.blocking_write() = result;
        strategy
    }

    /// Set the result returned by subsequent attempts.
    pub async fn set_result(&self, result: ExtractionResult) {
        *self.result.write().await = result;
    }

    /// Get recorded attempt URLs.
    pub async fn recorded_attempts(&self) -> Vec<String> {
        self.attempts.read().await.clone()
    }

    /// Get the number of attempts performed.
    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }
}

#[async_trait]
impl ExtractionStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, url: &str) -> ExtractionResult {
        self.attempts.write().await.push(url.to_string());
        self.result.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_attempts() {
        let strategy = MockStrategy::new("mock");
        strategy.attempt("https://a.example/1").await;
        strategy.attempt("https://a.example/2").await;

        let attempts = strategy.recorded_attempts().await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0], "https://a.example/1");
    }

    #[tokio::test]
    async fn test_returns_configured_result() {
        let strategy = MockStrategy::new("mock");
        strategy
            .set_result(ExtractionResult {
                title: Some("T".to_string()),
                ..Default::default()
            })
            .await;

        let result = strategy.attempt("https://a.example").await;
        assert_eq!(result.title.as_deref(), Some("T"));
    }
}
