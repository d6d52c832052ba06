//! Token-budget pacing for sequential completion calls.
//!
//! Each call is preceded by a sleep proportional to its estimated token cost so the
//! aggregate request rate stays under the configured tokens-per-minute budget.

use std::time::Duration;

pub const MIN_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    tokens_per_minute: u32,
    chars_per_token: u32,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(40_000, 4)
    }
}

impl Pacer {
    #[must_use]
    pub fn new(tokens_per_minute: u32, chars_per_token: u32) -> Self {
        Self {
            tokens_per_minute: tokens_per_minute.max(1),
            chars_per_token: chars_per_token.max(1),
        }
    }

    #[must_use]
    pub fn estimate_tokens(&self, content_len: usize) -> u64 {
        content_len as u64 / u64::from(self.chars_per_token)
    }

    /// Delay owed before sending `content_len` characters of prompt content.
    #[must_use]
    pub fn interval_for(&self, content_len: usize) -> Duration {
        let tokens = self.estimate_tokens(content_len);
        let millis = tokens.saturating_mul(60_000) / u64::from(self.tokens_per_minute);
        Duration::from_millis(millis).max(MIN_INTERVAL)
    }

    pub async fn wait(&self, content_len: usize) {
        let delay = self.interval_for(content_len);
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            estimated_tokens = self.estimate_tokens(content_len),
            "pacing before completion call"
        );
        tokio::time::sleep(delay).await;
    }
}
