//! # Feature: PostHog Strategy
//!
//! Sends analytics calls to a PostHog instance through its HTTP capture API.
//! Calls are queued on an unbounded channel and delivered by a background
//! task, so tracking never waits on the network.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.1.0: Added flush acknowledgements and exception capture
//! - 1.0.0: Initial release with async background delivery

use crate::analytics::strategy::{error_chain, AnalyticsStrategy, Properties};
use crate::analytics::LOG_TARGET;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Environment variable holding the project API key
pub const API_KEY_ENV: &str = "POSTHOG_KEY";

/// Environment variable holding the PostHog host, e.g. `https://app.posthog.com`
pub const API_HOST_ENV: &str = "POSTHOG_HOST";

const CAPTURE_PATH: &str = "/capture/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// PostHog's reserved page view event
pub const PAGEVIEW_EVENT: &str = "$pageview";

/// Event names remapped onto [`PAGEVIEW_EVENT`]
const PAGEVIEW_ALIASES: &[&str] = &["page viewed", "pageview"];

/// Body of a single `/capture/` request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaptureRequest {
    pub api_key: String,
    pub event: String,
    pub distinct_id: String,
    pub properties: Properties,
    pub timestamp: DateTime<Utc>,
}

enum Delivery {
    Capture(CaptureRequest),
    Flush(oneshot::Sender<()>),
}

struct Session {
    api_key: String,
    sender: mpsc::UnboundedSender<Delivery>,
    debug: bool,
}

/// PostHog-backed strategy
pub struct PostHogStrategy {
    session: RwLock<Option<Session>>,
    distinct_id: RwLock<String>,
    env_fallback: bool,
}

impl Default for PostHogStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl PostHogStrategy {
    pub fn new() -> Self {
        PostHogStrategy {
            session: RwLock::new(None),
            distinct_id: RwLock::new(anonymous_id()),
            env_fallback: true,
        }
    }

    /// Control whether missing settings are read from `POSTHOG_KEY` / `POSTHOG_HOST`
    pub fn with_env_fallback(mut self, enabled: bool) -> Self {
        self.env_fallback = enabled;
        self
    }

    /// Id the next event will be attributed to
    pub fn distinct_id(&self) -> String {
        self.distinct_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_distinct_id(&self, id: String) {
        *self
            .distinct_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = id;
    }

    fn setting(&self, config: &Properties, key: &str, env_key: &str) -> Option<String> {
        config
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                if self.env_fallback {
                    std::env::var(env_key).ok()
                } else {
                    None
                }
            })
            .filter(|v| !v.trim().is_empty())
    }

    /// Queue one event for delivery
    fn enqueue(&self, event: &str, mut properties: Properties) -> Result<()> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("PostHog is not initialized"))?;

        properties
            .entry("$lib")
            .or_insert_with(|| Value::from(env!("CARGO_PKG_NAME")));

        let request = CaptureRequest {
            api_key: session.api_key.clone(),
            event: event.to_string(),
            distinct_id: self.distinct_id(),
            properties,
            timestamp: Utc::now(),
        };

        if session.debug {
            debug!(target: LOG_TARGET, "Queueing PostHog event '{}' for {}", request.event, request.distinct_id);
        }

        session
            .sender
            .send(Delivery::Capture(request))
            .map_err(|_| anyhow!("PostHog delivery task has stopped"))
    }

    /// Background task that delivers queued events
    async fn background_sender(
        http: reqwest::Client,
        endpoint: String,
        mut receiver: mpsc::UnboundedReceiver<Delivery>,
        loaded: oneshot::Sender<()>,
    ) {
        let _ = loaded.send(());

        while let Some(delivery) = receiver.recv().await {
            match delivery {
                Delivery::Capture(request) => {
                    if let Err(e) = Self::send_capture(&http, &endpoint, &request).await {
                        error!(
                            target: LOG_TARGET,
                            "Failed to deliver PostHog event '{}': {e}", request.event
                        );
                    }
                }
                Delivery::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        debug!(target: LOG_TARGET, "PostHog delivery task stopped");
    }

    async fn send_capture(
        http: &reqwest::Client,
        endpoint: &str,
        request: &CaptureRequest,
    ) -> Result<()> {
        let response = http.post(endpoint).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("PostHog returned HTTP {status}");
        }
        Ok(())
    }
}

/// Map page view aliases onto PostHog's reserved event name
pub fn capture_event_name(event: &str) -> &str {
    if PAGEVIEW_ALIASES.contains(&event) {
        PAGEVIEW_EVENT
    } else {
        event
    }
}

fn anonymous_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl AnalyticsStrategy for PostHogStrategy {
    fn name(&self) -> &'static str {
        "posthog"
    }

    async fn initialize(&self, config: &Properties) -> Result<()> {
        let api_key = self
            .setting(config, "api_key", API_KEY_ENV)
            .ok_or_else(|| anyhow!("PostHog API key is missing (set api_key or {API_KEY_ENV})"))?;
        let api_host = self
            .setting(config, "api_host", API_HOST_ENV)
            .ok_or_else(|| anyhow!("PostHog host is missing (set api_host or {API_HOST_ENV})"))?;
        let debug = config.get("debug").and_then(Value::as_bool).unwrap_or(false);

        let host = reqwest::Url::parse(&api_host)
            .map_err(|e| anyhow!("Invalid PostHog host '{api_host}': {e}"))?;
        if !matches!(host.scheme(), "http" | "https") {
            bail!("PostHog host must be http or https: {api_host}");
        }
        let endpoint = format!("{}{}", api_host.trim_end_matches('/'), CAPTURE_PATH);

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let (loaded_tx, loaded_rx) = oneshot::channel();

        tokio::spawn(Self::background_sender(http, endpoint, receiver, loaded_tx));

        loaded_rx
            .await
            .map_err(|_| anyhow!("PostHog delivery task exited before loading"))?;

        // Replacing an earlier session drops its sender and stops that task
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(Session {
            api_key,
            sender,
            debug,
        });

        info!(target: LOG_TARGET, "PostHog initialized (host: {api_host})");
        Ok(())
    }

    fn track(&self, event: &str, properties: Option<&Properties>) -> Result<()> {
        self.enqueue(
            capture_event_name(event),
            properties.cloned().unwrap_or_default(),
        )
    }

    fn identify(&self, user_id: &str, properties: Option<&Properties>) -> Result<()> {
        let previous = self.distinct_id();

        let mut payload = Properties::new();
        payload.insert("$anon_distinct_id".into(), Value::String(previous.clone()));
        payload.insert(
            "$set".into(),
            Value::Object(properties.cloned().unwrap_or_default()),
        );

        self.set_distinct_id(user_id.to_string());
        if let Err(e) = self.enqueue("$identify", payload) {
            self.set_distinct_id(previous);
            return Err(e);
        }
        Ok(())
    }

    fn page(&self, name: Option<&str>, properties: Option<&Properties>) -> Result<()> {
        let mut payload = properties.cloned().unwrap_or_default();
        if let Some(name) = name {
            payload.insert("$pathname".into(), Value::from(name));
        }
        self.enqueue(PAGEVIEW_EVENT, payload)
    }

    fn set_user(&self, properties: &Properties) -> Result<()> {
        let mut payload = Properties::new();
        payload.insert("$set".into(), Value::Object(properties.clone()));
        self.enqueue("$set", payload)
    }

    fn capture_exception(
        &self,
        error: &(dyn Error + 'static),
        context: Option<&Properties>,
    ) -> Result<()> {
        let mut payload = context.cloned().unwrap_or_default();
        payload.insert("$exception_message".into(), Value::String(error.to_string()));
        payload.insert(
            "$exception_list".into(),
            Value::from(error_chain(error)),
        );
        self.enqueue("$exception", payload)
    }

    fn clear_identity(&self) -> Result<()> {
        self.set_distinct_id(anonymous_id());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.sender.is_closed())
    }

    fn cleanup(&self) {
        let session = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if session.is_some() {
            info!(target: LOG_TARGET, "PostHog session closed");
        }
        self.set_distinct_id(anonymous_id());
    }

    async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
            let session = guard
                .as_ref()
                .ok_or_else(|| anyhow!("PostHog is not initialized"))?;
            session
                .sender
                .send(Delivery::Flush(ack_tx))
                .map_err(|_| anyhow!("PostHog delivery task has stopped"))?;
        }
        ack_rx
            .await
            .map_err(|_| anyhow!("PostHog delivery task stopped before flushing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    fn config_for(host: &str) -> Properties {
        props(json!({"api_key": "phc_test", "api_host": host}))
    }

    #[test]
    fn test_pageview_aliases_are_remapped() {
        assert_eq!(capture_event_name("page viewed"), "$pageview");
        assert_eq!(capture_event_name("pageview"), "$pageview");
        assert_eq!(capture_event_name("Page Viewed"), "Page Viewed");
        assert_eq!(capture_event_name("user signed up"), "user signed up");
    }

    #[tokio::test]
    async fn test_initialize_requires_api_key() {
        let posthog = PostHogStrategy::new().with_env_fallback(false);
        let config = props(json!({"api_host": "https://app.posthog.com"}));
        let err = posthog.initialize(&config).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
        assert!(!posthog.is_ready());
    }

    #[tokio::test]
    async fn test_initialize_requires_host() {
        let posthog = PostHogStrategy::new().with_env_fallback(false);
        let config = props(json!({"api_key": "phc_test"}));
        assert!(posthog.initialize(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_rejects_non_http_host() {
        let posthog = PostHogStrategy::new().with_env_fallback(false);
        assert!(posthog.initialize(&config_for("ftp://example.com")).await.is_err());
        assert!(posthog.initialize(&config_for("not a url")).await.is_err());
    }

    #[test]
    fn test_calls_before_initialize_fail_without_panicking() {
        let posthog = PostHogStrategy::new();
        assert!(!posthog.is_ready());
        assert!(posthog.track("clicked", None).is_err());
        assert!(posthog.set_user(&Properties::new()).is_err());
    }

    #[test]
    fn test_failed_identify_keeps_previous_id() {
        let posthog = PostHogStrategy::new();
        let before = posthog.distinct_id();
        assert!(posthog.identify("user-1", None).is_err());
        assert_eq!(posthog.distinct_id(), before);
    }

    #[test]
    fn test_clear_identity_rotates_anonymous_id() {
        let posthog = PostHogStrategy::new();
        let before = posthog.distinct_id();
        posthog.clear_identity().unwrap();
        assert_ne!(posthog.distinct_id(), before);
    }

    #[tokio::test]
    async fn test_page_viewed_is_delivered_as_pageview() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/capture/")
            .match_body(Matcher::PartialJson(json!({
                "api_key": "phc_test",
                "event": "$pageview",
                "properties": {"path": "/pricing"}
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let posthog = PostHogStrategy::new().with_env_fallback(false);
        posthog.initialize(&config_for(&server.url())).await.unwrap();
        assert!(posthog.is_ready());

        posthog
            .track("page viewed", Some(&props(json!({"path": "/pricing"}))))
            .unwrap();
        posthog.flush().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_identify_switches_distinct_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/capture/")
            .match_body(Matcher::PartialJson(json!({
                "event": "$identify",
                "distinct_id": "user-42",
                "properties": {"$set": {"plan": "pro"}}
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let posthog = PostHogStrategy::new().with_env_fallback(false);
        posthog.initialize(&config_for(&server.url())).await.unwrap();
        posthog
            .identify("user-42", Some(&props(json!({"plan": "pro"}))))
            .unwrap();
        posthog.flush().await.unwrap();

        assert_eq!(posthog.distinct_id(), "user-42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_contained() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/capture/")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let posthog = PostHogStrategy::new().with_env_fallback(false);
        posthog.initialize(&config_for(&server.url())).await.unwrap();

        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(posthog.track("checkout", None).is_ok());
        assert!(posthog.capture_exception(&err, None).is_ok());
        assert!(posthog.flush().await.is_ok());
        assert!(posthog.is_ready());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cleanup_closes_session() {
        let server = mockito::Server::new_async().await;
        let posthog = PostHogStrategy::new().with_env_fallback(false);
        posthog.initialize(&config_for(&server.url())).await.unwrap();
        assert!(posthog.is_ready());

        posthog.cleanup();
        assert!(!posthog.is_ready());
        assert!(posthog.track("after cleanup", None).is_err());
        assert!(posthog.flush().await.is_err());
    }
}
