use std::time::{Duration, Instant};

/// Single-slot cancellable deadline driven by the owner's event loop.
///
/// Scheduling replaces whatever was pending; `poll` hands the payload back
/// once `now` reaches the deadline. Nothing runs on its own: the loop calls
/// `poll` on every tick and can sleep until `deadline()`.
#[derive(Debug, Clone)]
pub struct DwellTimer<T> {
    delay: Duration,
    pending: Option<Scheduled<T>>,
}

#[derive(Debug, Clone)]
struct Scheduled<T> {
    due: Instant,
    payload: T,
}

impl<T> DwellTimer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Arms the timer for `now + delay`, cancelling any pending payload.
    pub fn schedule(&mut self, payload: T, now: Instant) {
        self.pending = Some(Scheduled {
            due: now + self.delay,
            payload,
        });
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|scheduled| scheduled.payload)
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|scheduled| &scheduled.payload)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|scheduled| scheduled.due)
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self.deadline()?;
        if now >= due {
            self.cancel()
        } else {
            None
        }
    }
}
