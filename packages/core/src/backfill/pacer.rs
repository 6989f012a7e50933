//! Client-side per-minute pacing.
//!
//! Keeps the instants of requests issued during the last 60 seconds. When
//! the window is full the next request waits until the oldest entry has
//! aged out, which keeps every rolling 60-second window at or under the
//! limit. Time comes from `tokio::time`, so the wait is cancellable and
//! tests can run it on a paused clock.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{self, Instant};

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct MinutePacer {
    limit: usize,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl MinutePacer {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, MINUTE_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            limit,
            window,
            issued: VecDeque::with_capacity(limit),
        }
    }

    /// Pacer for a window the provider reports as partly used already.
    /// The used slots are treated as spent right now.
    pub fn seeded(limit: u32, remaining: u32) -> Self {
        let mut pacer = Self::new(limit);
        let used = limit.saturating_sub(remaining) as usize;
        let now = Instant::now();
        pacer.issued.extend(std::iter::repeat(now).take(used.min(pacer.limit)));
        pacer
    }

    /// Requests still allowed in the current window without waiting.
    pub fn available(&mut self) -> usize {
        self.evict(Instant::now());
        self.limit - self.issued.len()
    }

    /// Wait until a request may be issued, then record it.
    pub async fn acquire(&mut self) {
        self.evict(Instant::now());

        if self.issued.len() >= self.limit {
            if let Some(oldest) = self.issued.front().copied() {
                let resume_at = oldest + self.window;
                tracing::info!(
                    "Rate limiter reached {}/min. Sleeping {:.1}s...",
                    self.limit,
                    resume_at
                        .saturating_duration_since(Instant::now())
                        .as_secs_f64(),
                );
                time::sleep_until(resume_at).await;
            }
            self.evict(Instant::now());
        }

        self.issued.push_back(Instant::now());
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.issued.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }
}
