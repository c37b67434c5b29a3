//! No-op backend for tests and environments where analytics is switched off

use crate::analytics::strategy::{AnalyticsStrategy, Properties};
use anyhow::Result;
use async_trait::async_trait;
use std::error::Error;

/// Accepts every call and does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStrategy;

impl MockStrategy {
    pub fn new() -> Self {
        MockStrategy
    }
}

#[async_trait]
impl AnalyticsStrategy for MockStrategy {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initialize(&self, _config: &Properties) -> Result<()> {
        Ok(())
    }

    fn track(&self, _event: &str, _properties: Option<&Properties>) -> Result<()> {
        Ok(())
    }

    fn identify(&self, _user_id: &str, _properties: Option<&Properties>) -> Result<()> {
        Ok(())
    }

    fn page(&self, _name: Option<&str>, _properties: Option<&Properties>) -> Result<()> {
        Ok(())
    }

    fn set_user(&self, _properties: &Properties) -> Result<()> {
        Ok(())
    }

    fn capture_exception(
        &self,
        _error: &(dyn Error + 'static),
        _context: Option<&Properties>,
    ) -> Result<()> {
        Ok(())
    }

    fn clear_identity(&self) -> Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_always_ready_and_accepts_calls() {
        let mock = MockStrategy::new();
        assert!(mock.is_ready());
        assert!(mock.initialize(&Properties::new()).await.is_ok());
        assert!(mock.track("anything", None).is_ok());
        assert!(mock.clear_identity().is_ok());
        mock.cleanup();
        assert!(mock.is_ready());
    }
}
