//! FIFO rate limiter for outbound chat messages.

use std::{collections::VecDeque, future::Future, sync::Arc, time::Duration};

use {
    tokio::{sync::Mutex, time::Instant},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use guildbot_metrics::{histogram, polls as poll_metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleLimits {
    pub max_per_window: usize,
    pub window: Duration,
}

impl Default for ThrottleLimits {
    fn default() -> Self {
        // Discord allows 5 messages per 5 seconds per channel.
        Self {
            max_per_window: 5,
            window: Duration::from_secs(5),
        }
    }
}

/// Serializes outbound sends and paces them to at most `max_per_window`
/// starts per sliding `window`.
///
/// Callers queue in submission order: the internal lock is a fair tokio
/// mutex, so waiters are woken FIFO. Nothing is ever dropped. The queued
/// operation's own error is returned unchanged to its caller.
#[derive(Clone)]
pub struct OutboundThrottle {
    limits: ThrottleLimits,
    recent: Arc<Mutex<VecDeque<Instant>>>,
}

impl OutboundThrottle {
    #[must_use]
    pub fn new(limits: ThrottleLimits) -> Self {
        let limits = ThrottleLimits {
            max_per_window: limits.max_per_window.max(1),
            window: limits.window,
        };
        Self {
            limits,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(limits.max_per_window))),
        }
    }

    #[must_use]
    pub fn limits(&self) -> ThrottleLimits {
        self.limits
    }

    /// Wait for this caller's turn, then run `op` to completion before the
    /// next queued operation may start.
    pub async fn schedule<F, T>(&self, op: F) -> T
    where
        F: Future<Output = T>,
    {
        let queued_at = Instant::now();
        let mut recent = self.recent.lock().await;

        let now = Instant::now();
        while recent
            .front()
            .is_some_and(|started| now.duration_since(*started) >= self.limits.window)
        {
            recent.pop_front();
        }

        if recent.len() >= self.limits.max_per_window
            && let Some(oldest) = recent.pop_front()
        {
            let ready_at = oldest + self.limits.window;
            debug!(
                wait_ms = ready_at.saturating_duration_since(now).as_millis() as u64,
                "outbound throttle full, waiting"
            );
            tokio::time::sleep_until(ready_at).await;
        }

        let started = Instant::now();
        recent.push_back(started);

        #[cfg(feature = "metrics")]
        histogram!(poll_metrics::THROTTLE_WAIT_SECONDS)
            .record(started.duration_since(queued_at).as_secs_f64());
        #[cfg(not(feature = "metrics"))]
        let _ = queued_at;

        op.await
    }
}

impl Default for OutboundThrottle {
    fn default() -> Self {
        Self::new(ThrottleLimits::default())
    }
}
