//! Best-effort status notifications.
//!
//! A plot run announces each pause and its completion by POSTing a plain
//! UTF-8 text body to an optional webhook.  Delivery is fire-and-forget:
//! failures are logged and swallowed so that a notification outage never
//! interrupts a plot.

use std::time::Duration;

/// A sink for status messages.
pub trait Notify {
    fn notify(&self, message: &str);
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notify for NullNotifier {
    fn notify(&self, _message: &str) {}
}

const TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs messages to a webhook URL; a no-op without one.
pub struct HttpNotifier {
    endpoint: Option<String>,
    agent: ureq::Agent,
}

impl HttpNotifier {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint.filter(|e| !e.trim().is_empty());
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .into();
        Self { endpoint, agent }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

impl Notify for HttpNotifier {
    fn notify(&self, message: &str) {
        let Some(url) = &self.endpoint else { return };
        match self.agent.post(url).send(message.as_bytes()) {
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), url = %url, "notification sent");
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "notification failed");
            }
        }
    }
}

impl<N: Notify + ?Sized> Notify for Box<N> {
    fn notify(&self, message: &str) {
        (**self).notify(message)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
