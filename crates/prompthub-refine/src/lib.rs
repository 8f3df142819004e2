//! AI prompt refinement.
//!
//! The library core never talks to a model directly; it goes through the
//! [`Refiner`] trait so callers can swap in a stub.

pub mod engine;
mod parse;
mod prompt;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use prompthub_core::{ai_configured, AiSettings};

pub use parse::clean_output;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shown to the user whenever a refinement fails, whatever the cause.
pub const FAILURE_MESSAGE: &str = "Sorry, there was an error refining the prompt.";

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("AI provider is not configured")]
    NotConfigured,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("{0}")]
    Backend(String),
    #[error("model returned no text")]
    Empty,
    #[error("refinement timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("a refinement is already in progress")]
    Busy,
}

impl RefineError {
    pub fn user_message(&self) -> &'static str {
        FAILURE_MESSAGE
    }
}

#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, prompt_text: &str) -> Result<String, RefineError>;
}

/// Refines through whichever LLM provider the settings name.
pub struct LlmRefiner {
    settings: AiSettings,
    timeout: Duration,
}

impl LlmRefiner {
    pub fn new(settings: AiSettings) -> Self {
        Self {
            settings,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Refiner for LlmRefiner {
    async fn refine(&self, prompt_text: &str) -> Result<String, RefineError> {
        if !ai_configured(&self.settings) {
            return Err(RefineError::NotConfigured);
        }
        let system = prompt::system_prompt();
        let user_msg = prompt::user_message(prompt_text);

        log::info!("refining via {} ({})", self.settings.provider, self.settings.model);

        let raw = tokio::time::timeout(
            self.timeout,
            engine::generate(&self.settings, &system, &user_msg),
        )
        .await
        .map_err(|_| RefineError::TimedOut(self.timeout))??;

        log::debug!("raw refinement output:\n{raw}");
        clean_output(&raw).ok_or(RefineError::Empty)
    }
}

/// Allows one refinement at a time. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

/// Releases the [`InFlight`] slot on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_begin(&self) -> Result<InFlightGuard, RefineError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RefineError::Busy)?;
        Ok(InFlightGuard {
            busy: Arc::clone(&self.busy),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Run a single refinement, refusing to start while another is pending.
/// Failures are logged here; callers show [`RefineError::user_message`].
pub async fn refine_once(
    refiner: &dyn Refiner,
    in_flight: &InFlight,
    prompt_text: &str,
) -> Result<String, RefineError> {
    let _guard = in_flight.try_begin()?;
    refiner
        .refine(prompt_text)
        .await
        .inspect_err(|e| log::warn!("refinement failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    struct Echo;

    #[async_trait]
    impl Refiner for Echo {
        async fn refine(&self, prompt_text: &str) -> Result<String, RefineError> {
            Ok(format!("{prompt_text}, highly detailed, 8k"))
        }
    }

    /// Blocks until released, so a test can observe the in-flight window.
    struct Gate(Arc<Notify>);

    #[async_trait]
    impl Refiner for Gate {
        async fn refine(&self, prompt_text: &str) -> Result<String, RefineError> {
            self.0.notified().await;
            Ok(prompt_text.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl Refiner for Failing {
        async fn refine(&self, _: &str) -> Result<String, RefineError> {
            Err(RefineError::Backend("chat: 503".into()))
        }
    }

    #[tokio::test]
    async fn refine_once_returns_refined_text() {
        let in_flight = InFlight::new();
        let out = refine_once(&Echo, &in_flight, "a fox").await.unwrap();
        assert_eq!(out, "a fox, highly detailed, 8k");
        assert!(!in_flight.is_busy());
    }

    #[tokio::test]
    async fn second_call_while_pending_is_busy() {
        let gate = Arc::new(Notify::new());
        let refiner: Arc<dyn Refiner> = Arc::new(Gate(Arc::clone(&gate)));
        let in_flight = InFlight::new();

        let pending = {
            let refiner = Arc::clone(&refiner);
            let in_flight = in_flight.clone();
            tokio::spawn(async move { refine_once(refiner.as_ref(), &in_flight, "first").await })
        };
        while !in_flight.is_busy() {
            tokio::task::yield_now().await;
        }

        let second = refine_once(refiner.as_ref(), &in_flight, "second").await;
        assert!(matches!(second, Err(RefineError::Busy)));

        gate.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), "first");
        assert!(!in_flight.is_busy());
    }

    #[tokio::test]
    async fn failure_releases_slot_and_has_user_message() {
        let in_flight = InFlight::new();
        let err = refine_once(&Failing, &in_flight, "x").await.unwrap_err();
        assert_eq!(err.user_message(), FAILURE_MESSAGE);
        assert!(!in_flight.is_busy());
    }

    #[tokio::test]
    async fn unconfigured_settings_fail_fast() {
        let err = LlmRefiner::new(AiSettings::default()).refine("x").await.unwrap_err();
        assert!(matches!(err, RefineError::NotConfigured));
    }
}
