use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::errors::AskError;

// Limits for the sliding window plus the cooldown imposed once it overflows
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 12,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

// Window state for one caller: recent request times in arrival order,
// plus the cooldown deadline if the limit was hit
#[derive(Debug, Default)]
struct Window {
    timestamps: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl Window {
    fn check_at(&mut self, now: Instant, config: &RateLimitConfig) -> Result<(), AskError> {
        if let Some(until) = self.blocked_until {
            // A request arriving exactly at the deadline is unblocked
            if now < until {
                return Err(AskError::RateLimited {
                    retry_after_secs: remaining_whole_secs(until - now),
                });
            }
            self.blocked_until = None;
        }

        // Drop entries that have fallen out of the window
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) > config.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() >= config.max_requests {
            // The triggering request is not recorded
            self.blocked_until = Some(now + config.cooldown);
            return Err(AskError::RateLimited {
                retry_after_secs: config.cooldown.as_secs(),
            });
        }

        self.timestamps.push_back(now);
        Ok(())
    }
}

// Sliding-window limiter keyed by caller identity
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    // Check and record one request for the caller
    pub fn check(&self, caller: &str) -> Result<(), AskError> {
        self.check_at(caller, Instant::now())
    }

    fn check_at(&self, caller: &str, now: Instant) -> Result<(), AskError> {
        let mut window = self.windows.entry(caller.to_string()).or_default();
        window.check_at(now, &self.config)
    }
}

fn remaining_whole_secs(remaining: Duration) -> u64 {
    remaining.as_secs_f64().ceil() as u64
}
