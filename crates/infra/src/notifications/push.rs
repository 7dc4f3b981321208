//! Push delivery seam.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub link: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// The provider no longer recognises the token; it should be deactivated.
    #[error("device token is not registered")]
    InvalidToken,

    #[error("push transport failed: {0}")]
    Transport(String),
}

/// Per-token outcome of a multicast, in the order tokens were given.
#[derive(Debug, Clone, Default)]
pub struct MulticastReport {
    pub responses: Vec<Result<(), PushError>>,
}

impl MulticastReport {
    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }
}

pub trait PushProvider: Send + Sync {
    fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError>;

    /// Whole-call errors mean nothing was sent; per-token errors are in the report.
    fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        Ok(MulticastReport {
            responses: tokens.iter().map(|t| self.send(t, message)).collect(),
        })
    }
}

impl<P> PushProvider for Arc<P>
where
    P: PushProvider + ?Sized,
{
    fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        (**self).send(token, message)
    }

    fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        (**self).send_multicast(tokens, message)
    }
}

/// Provider for nodes without push credentials: logs and reports success.
#[derive(Debug, Default)]
pub struct LoggingPushProvider;

impl PushProvider for LoggingPushProvider {
    fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        let suffix = token.len().saturating_sub(6);
        info!(
            token = %token.get(suffix..).unwrap_or(token),
            title = %message.title,
            link = %message.link,
            "push delivered (log only)"
        );
        Ok(())
    }
}

/// Records every send. Tokens marked invalid are rejected like a real provider
/// would after an app uninstall.
#[derive(Debug, Default)]
pub struct InMemoryPushProvider {
    sent: Mutex<Vec<(String, PushMessage)>>,
    invalid: Mutex<HashSet<String>>,
    offline: Mutex<bool>,
}

impl InMemoryPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_token(&self, token: impl Into<String>) {
        if let Ok(mut invalid) = self.invalid.lock() {
            invalid.insert(token.into());
        }
    }

    /// While offline every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut flag) = self.offline.lock() {
            *flag = offline;
        }
    }

    pub fn sent(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn is_offline(&self) -> bool {
        self.offline.lock().map(|f| *f).unwrap_or(false)
    }
}

impl PushProvider for InMemoryPushProvider {
    fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        if self.is_offline() {
            return Err(PushError::Transport("provider offline".into()));
        }
        let rejected = self
            .invalid
            .lock()
            .map(|invalid| invalid.contains(token))
            .unwrap_or(false);
        if rejected {
            return Err(PushError::InvalidToken);
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| PushError::Transport("recorder poisoned".into()))?;
        sent.push((token.to_string(), message.clone()));
        Ok(())
    }

    fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        if self.is_offline() {
            return Err(PushError::Transport("provider offline".into()));
        }
        Ok(MulticastReport {
            responses: tokens.iter().map(|t| self.send(t, message)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> PushMessage {
        PushMessage {
            title: "Job saved".into(),
            body: "Saved".into(),
            link: "https://jobs.example.com/jobs/a".into(),
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn multicast_reports_per_token_outcomes() {
        let provider = InMemoryPushProvider::new();
        provider.reject_token("stale");

        let report = provider
            .send_multicast(&["fresh".into(), "stale".into()], &message())
            .unwrap();
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.responses[1], Err(PushError::InvalidToken));
        assert_eq!(provider.sent().len(), 1);
    }

    #[test]
    fn offline_provider_fails_the_whole_call() {
        let provider = InMemoryPushProvider::new();
        provider.set_offline(true);
        assert!(matches!(
            provider.send_multicast(&["a".into()], &message()),
            Err(PushError::Transport(_))
        ));
    }
}
