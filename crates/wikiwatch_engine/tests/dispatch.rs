use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use wikiwatch_core::PostJob;
use wikiwatch_engine::{
    DispatchSettings, PauseGate, PublishDispatcher, PublishError, Publisher, RetryPolicy,
};

/// Publisher replaying a script of outcomes and timestamping every call.
struct ScriptedPublisher {
    script: Mutex<VecDeque<Result<(), PublishError>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedPublisher {
    fn new(script: Vec<Result<(), PublishError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(&self, caption: &str, _image: &Path) -> Result<(), PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push((caption.to_string(), Instant::now()));
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

fn job(caption: &str) -> PostJob {
    PostJob {
        caption: caption.to_string(),
        image_path: PathBuf::from("pics/test.jpg"),
    }
}

fn settings() -> DispatchSettings {
    DispatchSettings {
        pacing: Duration::from_secs(20),
        retry: RetryPolicy {
            attempts: 5,
            wait: Duration::from_secs(30),
            max_elapsed: None,
        },
        cooldown: Duration::from_secs(2 * 3600),
    }
}

#[tokio::test(start_paused = true)]
async fn drains_jobs_in_order_with_pacing() {
    let publisher = ScriptedPublisher::new(vec![Ok(()), Ok(())]);
    let gate = PauseGate::new();
    let dispatcher = PublishDispatcher::new(&publisher, &gate, settings());
    let mut queue: VecDeque<PostJob> = vec![job("first"), job("second")].into();

    let published = dispatcher.drain(&mut queue).await.unwrap();

    assert_eq!(published, 2);
    assert!(queue.is_empty());
    let instants = publisher.call_instants();
    // Second submission waits out the 20s pacing delay.
    assert_eq!(instants[1] - instants[0], Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn too_fast_is_retried_after_the_fixed_wait() {
    let publisher =
        ScriptedPublisher::new(vec![Err(PublishError::TooFast), Err(PublishError::TooFast), Ok(())]);
    let gate = PauseGate::new();
    let dispatcher = PublishDispatcher::new(&publisher, &gate, settings());
    let mut queue: VecDeque<PostJob> = vec![job("paced")].into();

    let published = dispatcher.drain(&mut queue).await.unwrap();

    assert_eq!(published, 1);
    assert_eq!(publisher.call_count(), 3);
    let instants = publisher.call_instants();
    assert_eq!(instants[1] - instants[0], Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn throttle_signal_freezes_the_worker_for_the_cooldown() {
    let publisher = ScriptedPublisher::new(vec![Err(PublishError::Throttled), Ok(())]);
    let gate = PauseGate::new();
    let dispatcher = PublishDispatcher::new(&publisher, &gate, settings());
    let mut queue: VecDeque<PostJob> = vec![job("throttled")].into();

    let published = dispatcher.drain(&mut queue).await.unwrap();

    assert_eq!(published, 1);
    let instants = publisher.call_instants();
    // Cooldown (2h) plus the inter-attempt wait (30s) before the retry.
    assert_eq!(
        instants[1] - instants[0],
        Duration::from_secs(2 * 3600 + 30)
    );
    assert!(!gate.is_paused());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_abort_and_keep_remaining_jobs() {
    let publisher = ScriptedPublisher::new(vec![
        Err(PublishError::Other("boom".to_string())),
        Err(PublishError::Other("boom".to_string())),
        Err(PublishError::Other("boom".to_string())),
        Err(PublishError::Other("boom".to_string())),
        Err(PublishError::Other("boom".to_string())),
    ]);
    let gate = PauseGate::new();
    let dispatcher = PublishDispatcher::new(&publisher, &gate, settings());
    let mut queue: VecDeque<PostJob> = vec![job("doomed"), job("waiting")].into();

    let err = dispatcher.drain(&mut queue).await.unwrap_err();

    assert_eq!(err, PublishError::Other("boom".to_string()));
    assert_eq!(publisher.call_count(), 5);
    // Both the failed job and the untouched one wait for the next cycle.
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.front().unwrap().caption, "doomed");
}

#[tokio::test(start_paused = true)]
async fn empty_queue_is_a_quiet_no_op() {
    let publisher = ScriptedPublisher::new(Vec::new());
    let gate = PauseGate::new();
    let dispatcher = PublishDispatcher::new(&publisher, &gate, settings());
    let mut queue: VecDeque<PostJob> = VecDeque::new();

    let published = dispatcher.drain(&mut queue).await.unwrap();

    assert_eq!(published, 0);
    assert_eq!(publisher.call_count(), 0);
}
