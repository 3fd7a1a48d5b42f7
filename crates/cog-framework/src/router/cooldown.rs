use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Entries beyond this count trigger a sweep of expired ones.
const SWEEP_THRESHOLD: usize = 1024;

/// Per user, per command cooldowns.
#[derive(Default)]
pub struct CooldownTracker {
    until: Mutex<HashMap<(String, String), Instant>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `user` may run `command` again, as `Err`.
    pub fn check(&self, user: &str, command: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let until = self.until.lock();
        match until.get(&(user.to_string(), command.to_string())) {
            Some(deadline) if *deadline > now => Err(*deadline - now),
            _ => Ok(()),
        }
    }

    /// Starts the cooldown for a use that is about to run. Fails like
    /// [`check`](Self::check) if a concurrent use already started it.
    pub fn mark(&self, user: &str, command: &str, period: Duration) -> Result<(), Duration> {
        if period.is_zero() {
            return Ok(());
        }
        let now = Instant::now();
        let mut until = self.until.lock();

        let key = (user.to_string(), command.to_string());
        if let Some(deadline) = until.get(&key).filter(|d| **d > now) {
            return Err(*deadline - now);
        }

        if until.len() >= SWEEP_THRESHOLD {
            until.retain(|_, deadline| *deadline > now);
        }
        until.insert(key, now + period);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.until.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.until.lock().is_empty()
    }
}
