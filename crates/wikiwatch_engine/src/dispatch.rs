use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use watch_logging::{watch_error, watch_info, watch_warn};

use wikiwatch_core::PostJob;

use crate::publish::{PublishError, Publisher};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Delay between successful posts to stay under provider throughput.
    pub pacing: Duration,
    pub retry: RetryPolicy,
    /// Whole-worker pause taken when the provider sends the reserved
    /// throttle signal.
    pub cooldown: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(20),
            retry: RetryPolicy::publish_default(),
            cooldown: Duration::from_secs(2 * 3600),
        }
    }
}

/// Explicit pause controller owned by the cycle driver.
///
/// Pausing blocks the single worker, so the whole scheduling process
/// stands still for the duration; there is no cancellation once the
/// cooldown sleep begins.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: AtomicBool,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub async fn pause(&self, duration: Duration) {
        self.paused.store(true, Ordering::Relaxed);
        watch_warn!("worker paused for {duration:?}");
        tokio::time::sleep(duration).await;
        self.resume();
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
        watch_info!("worker resumed");
    }
}

/// Drains the post queue sequentially with pacing, retry and cooldown.
pub struct PublishDispatcher<'a> {
    publisher: &'a dyn Publisher,
    gate: &'a PauseGate,
    settings: DispatchSettings,
}

impl<'a> PublishDispatcher<'a> {
    pub fn new(
        publisher: &'a dyn Publisher,
        gate: &'a PauseGate,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            publisher,
            gate,
            settings,
        }
    }

    /// Publishes queued jobs in order until the queue is empty or a job
    /// exhausts its retry budget. A failed job stays at the front of the
    /// queue, so nothing queued is lost to the next cycle.
    pub async fn drain(&self, queue: &mut VecDeque<PostJob>) -> Result<usize, PublishError> {
        let mut published = 0usize;
        while let Some(job) = queue.front() {
            self.submit(job).await?;
            queue.pop_front();
            published += 1;
            tokio::time::sleep(self.settings.pacing).await;
        }
        Ok(published)
    }

    /// One job through the retry loop. `TooFast` is retried without a log
    /// entry; `Throttled` first freezes the worker through the gate for
    /// the full cooldown; everything else is logged. Each failure counts
    /// against the bounded attempt budget.
    async fn submit(&self, job: &PostJob) -> Result<(), PublishError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.publisher.publish(&job.caption, &job.image_path).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            match &err {
                PublishError::TooFast => {}
                PublishError::Throttled => {
                    watch_warn!("provider throttle signal received, entering cooldown");
                    self.gate.pause(self.settings.cooldown).await;
                }
                PublishError::Other(message) => {
                    watch_error!("publish attempt {attempt} failed: {message}");
                }
            }

            if attempt >= self.settings.retry.attempts {
                return Err(err);
            }
            tokio::time::sleep(self.settings.retry.wait).await;
        }
    }
}
