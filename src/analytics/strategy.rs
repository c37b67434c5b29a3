//! Strategy contract implemented by every analytics backend

use anyhow::Result;
use async_trait::async_trait;
use std::error::Error;

/// Free-form event or identity properties
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A pluggable analytics backend.
///
/// Only `initialize` and `flush` may suspend; every other method must return
/// without waiting on network I/O. `is_ready` must be safe to call before
/// `initialize`.
#[async_trait]
pub trait AnalyticsStrategy: Send + Sync {
    /// Short backend name used in log lines
    fn name(&self) -> &'static str;

    /// Prepare the backend. The shape of `config` is backend specific.
    async fn initialize(&self, config: &Properties) -> Result<()>;

    fn track(&self, event: &str, properties: Option<&Properties>) -> Result<()>;

    fn identify(&self, user_id: &str, properties: Option<&Properties>) -> Result<()>;

    fn page(&self, name: Option<&str>, properties: Option<&Properties>) -> Result<()>;

    /// Attach properties to the current user without changing identity
    fn set_user(&self, properties: &Properties) -> Result<()>;

    fn capture_exception(
        &self,
        error: &(dyn Error + 'static),
        context: Option<&Properties>,
    ) -> Result<()>;

    /// Drop any user/session association held by the backend
    fn clear_identity(&self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Release backend resources. Backends without any simply keep the default.
    fn cleanup(&self) {}

    /// Wait until everything queued so far has been handed to the backend
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Message followed by each `source()` in the chain, outermost first
pub fn error_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "request failed")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_chain_walks_sources() {
        let err = Wrapped(std::io::Error::new(std::io::ErrorKind::Other, "socket closed"));
        assert_eq!(error_chain(&err), vec!["request failed", "socket closed"]);
    }

    #[test]
    fn test_error_chain_single() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(error_chain(&err), vec!["boom"]);
    }
}
