//! Mock LLM provider for testing

use async_trait::async_trait;
use std::time::Instant;

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

/// A mock LLM provider that returns predefined responses.
/// Keeps API tests deterministic without real LLM access.
#[derive(Debug)]
pub struct MockProvider {
    pub name: String,
    /// Canned responses (cycles through them)
    responses: Vec<String>,
    index: std::sync::atomic::AtomicUsize,
    latency_ms: u64,
}

impl MockProvider {
    /// Create a new mock provider with given responses
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            index: std::sync::atomic::AtomicUsize::new(0),
            latency_ms: 5,
        }
    }

    /// Create a mock that always returns the same response
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a keyword-driven mock that responds based on prompt content
    pub fn smart() -> Self {
        Self {
            name: "smart-mock".to_string(),
            responses: vec![],
            index: std::sync::atomic::AtomicUsize::new(0),
            latency_ms: 5,
        }
    }

    fn generate_smart_response(&self, request: &LlmRequest) -> String {
        let prompt_lower = request.prompt.to_lowercase();

        if prompt_lower.contains("ranking") || prompt_lower.contains("decision") {
            return "Decision rationale:\n\
                 1. The top-ranked alternative dominates on the highest-weighted criteria\n\
                 2. The ranking is stable under moderate weight perturbation\n\
                 3. Recommended action: adopt the leading alternative\n\n\
                 Confidence: 85%"
                .to_string();
        }

        if prompt_lower.contains("fraud") || prompt_lower.contains("transaction") {
            return "Risk assessment:\n\
                 - Transaction characteristics reviewed against known patterns\n\
                 - No additional indicators beyond the triggered rules\n\
                 - Recommended action: route flagged items to manual review"
                .to_string();
        }

        if prompt_lower.contains("summarize") || prompt_lower.contains("summary") {
            return "Summary: key points consolidated into a concise overview.".to_string();
        }

        format!(
            "Analysis of: \"{}\"\n- Request processed\n- No anomalies noted",
            &request.prompt[..request.prompt.len().min(60)]
        )
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();

        tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;

        let content = if self.responses.is_empty() {
            self.generate_smart_response(&request)
        } else {
            let idx = self
                .index
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.responses[idx % self.responses.len()].clone()
        };

        Ok(LlmResponse {
            content,
            model: self.name.clone(),
            tokens_used: Some((request.prompt.len() / 4) as u32 + 50),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider() {
        let mock = MockProvider::constant("flagged for review");
        let response = mock.ask("test").await.unwrap();
        assert_eq!(response, "flagged for review");
    }

    #[tokio::test]
    async fn test_smart_mock() {
        let mock = MockProvider::smart();
        let response = mock.ask("Explain this decision ranking").await.unwrap();
        assert!(response.contains("Decision rationale"));
    }

    #[tokio::test]
    async fn test_canned_responses_cycle() {
        let mock = MockProvider::new(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(mock.ask("a").await.unwrap(), "one");
        assert_eq!(mock.ask("b").await.unwrap(), "two");
        assert_eq!(mock.ask("c").await.unwrap(), "one");
    }
}
