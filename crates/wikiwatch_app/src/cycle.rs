use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use thiserror::Error;
use watch_logging::{watch_error, watch_info};

use wikiwatch_core::{compose_caption, PostJob, Task};
use wikiwatch_engine::{
    build_picture_html, extract_change_lines, scan_watch_window, CaptionRenderer, DedupStore,
    DispatchSettings, FetchError, PauseGate, PublishDispatcher, Publisher, RenderError, ScanError,
    WikiSource,
};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Task and post queues. They live across ticks: a task that failed
/// generation and a post that could not be published both wait here for
/// the next cycle, and are lost only if the process exits.
#[derive(Debug, Default)]
pub struct CycleState {
    pub tasks: VecDeque<Task>,
    pub posts: VecDeque<PostJob>,
}

/// Runs one scan -> generate -> publish cycle to completion.
///
/// The three phases are isolated: a scan abort still lets previously
/// queued tasks generate, and a failing task is requeued without blocking
/// the tasks or posts behind it.
pub struct CycleDriver {
    source: Arc<dyn WikiSource>,
    renderer: Arc<dyn CaptionRenderer>,
    publisher: Arc<dyn Publisher>,
    gate: PauseGate,
    store: DedupStore,
    dispatch: DispatchSettings,
    pics_dir: PathBuf,
}

impl CycleDriver {
    pub fn new(
        source: Arc<dyn WikiSource>,
        renderer: Arc<dyn CaptionRenderer>,
        publisher: Arc<dyn Publisher>,
        store: DedupStore,
        dispatch: DispatchSettings,
        pics_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            renderer,
            publisher,
            gate: PauseGate::new(),
            store,
            dispatch,
            pics_dir,
        }
    }

    pub async fn run_cycle(&mut self, state: &mut CycleState) {
        match self.scan().await {
            Ok(tasks) => state.tasks.extend(tasks),
            Err(err) => watch_error!("scan aborted: {err}"),
        }

        let pending: Vec<Task> = state.tasks.drain(..).collect();
        for task in pending {
            match self.generate(&task).await {
                Ok(post) => state.posts.push_back(post),
                Err(err) => {
                    watch_error!(
                        "generation failed for page {} ({}), requeued: {err}",
                        task.page_id,
                        task.page_name
                    );
                    state.tasks.push_back(task);
                }
            }
        }

        let dispatcher =
            PublishDispatcher::new(self.publisher.as_ref(), &self.gate, self.dispatch.clone());
        match dispatcher.drain(&mut state.posts).await {
            Ok(0) => {}
            Ok(published) => watch_info!("published {published} posts"),
            Err(err) => watch_error!("publish phase aborted: {err}"),
        }
    }

    async fn scan(&mut self) -> Result<Vec<Task>, ScanError> {
        let feed = self.source.recent_days().await.map_err(ScanError::Fetch)?;
        scan_watch_window(&feed, &mut self.store, self.source.as_ref()).await
    }

    async fn generate(&self, task: &Task) -> Result<PostJob, GenerateError> {
        let html = self.source.diff_document(task.page_id).await?;
        let changes = extract_change_lines(&html);
        let caption = compose_caption(
            &task.page_name,
            &changes,
            &self.source.diff_url(task.page_id),
        );

        let picture_html = build_picture_html(&task.page_name, &html);
        tokio::fs::create_dir_all(&self.pics_dir)
            .await
            .map_err(RenderError::Io)?;
        let image_path = self.pics_dir.join(picture_filename(Local::now()));
        self.renderer.render(&picture_html, &image_path).await?;

        Ok(PostJob {
            caption,
            image_path,
        })
    }
}

fn picture_filename(now: DateTime<Local>) -> String {
    format!("{}.jpg", now.format("%Y-%m-%d_%H-%M-%S-%6f"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use wikiwatch_core::{PostJob, Task, WatchEntry};
    use wikiwatch_engine::{
        CaptionRenderer, DayGroup, DedupStore, DispatchSettings, FailureKind, FetchError,
        PageHasher, PublishError, Publisher, RenderError, WikiSource,
    };

    use super::{picture_filename, CycleDriver, CycleState};

    #[test]
    fn picture_filename_carries_a_six_digit_fraction() {
        use chrono::TimeZone;
        let at = chrono::Local.with_ymd_and_hms(2026, 8, 29, 1, 2, 3).unwrap();
        assert_eq!(picture_filename(at), "2026-08-29_01-02-03-000000.jpg");
    }

    fn network_error() -> FetchError {
        FetchError {
            kind: FailureKind::Network,
            message: "scripted failure".to_string(),
        }
    }

    /// Canned wiki: a fixed feed plus per-page diff documents.
    struct FakeWiki {
        feed: Vec<DayGroup>,
        feed_fails: bool,
        diffs: HashMap<u64, String>,
    }

    impl FakeWiki {
        fn empty() -> Self {
            Self {
                feed: Vec::new(),
                feed_fails: false,
                diffs: HashMap::new(),
            }
        }

        fn with_page(page_id: u64, age: &str, diff_html: &str) -> Self {
            let entry = WatchEntry {
                page_id,
                page_name: format!("page-{page_id}"),
                age_text: age.to_string(),
            };
            Self {
                feed: vec![DayGroup {
                    day: "today".to_string(),
                    entries: vec![entry],
                }],
                feed_fails: false,
                diffs: HashMap::from([(page_id, diff_html.to_string())]),
            }
        }
    }

    #[async_trait]
    impl PageHasher for FakeWiki {
        async fn page_hash(&self, page_id: u64) -> Result<String, FetchError> {
            Ok(format!("hash-{page_id}"))
        }
    }

    #[async_trait]
    impl WikiSource for FakeWiki {
        async fn recent_days(&self) -> Result<Vec<DayGroup>, FetchError> {
            if self.feed_fails {
                return Err(network_error());
            }
            Ok(self.feed.clone())
        }

        async fn diff_document(&self, page_id: u64) -> Result<String, FetchError> {
            self.diffs.get(&page_id).cloned().ok_or_else(network_error)
        }

        fn diff_url(&self, page_id: u64) -> String {
            format!("https://wiki.example/diffx/{page_id}.html")
        }
    }

    /// Renderer that creates an empty file instead of a real picture.
    struct TouchRenderer;

    #[async_trait]
    impl CaptionRenderer for TouchRenderer {
        async fn render(&self, _html: &str, output: &Path) -> Result<(), RenderError> {
            tokio::fs::write(output, b"").await.map_err(RenderError::Io)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        captions: Mutex<Vec<String>>,
    }

    impl RecordingPublisher {
        fn captions(&self) -> Vec<String> {
            self.captions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, caption: &str, _image: &Path) -> Result<(), PublishError> {
            self.captions.lock().unwrap().push(caption.to_string());
            Ok(())
        }
    }

    fn driver(
        wiki: FakeWiki,
        publisher: Arc<RecordingPublisher>,
        dir: &TempDir,
    ) -> CycleDriver {
        let store = DedupStore::load(dir.path().join("store.json")).unwrap();
        CycleDriver::new(
            Arc::new(wiki),
            Arc::new(TouchRenderer),
            publisher,
            store,
            DispatchSettings::default(),
            dir.path().join("pics"),
        )
    }

    const DIFF_PAGE: &str = concat!(
        "<html><body><pre class=\"diff\">",
        "<span style=\"color:red;\">旧行</span>",
        "<span style=\"color:blue;\">新行</span>",
        "</pre></body></html>",
    );

    #[tokio::test(start_paused = true)]
    async fn fresh_page_flows_from_feed_to_publisher() {
        let dir = TempDir::new().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let mut driver = driver(FakeWiki::with_page(1080, "30m", DIFF_PAGE), publisher.clone(), &dir);
        let mut state = CycleState::default();

        driver.run_cycle(&mut state).await;

        let captions = publisher.captions();
        assert_eq!(captions.len(), 1);
        assert_eq!(
            captions[0],
            "page-1080：-旧行|+新行https://wiki.example/diffx/1080.html"
        );
        assert!(state.tasks.is_empty());
        assert!(state.posts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_is_requeued_without_blocking_others() {
        let dir = TempDir::new().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        // Page 2 has a diff document; page 1 does not and will fail.
        let mut wiki = FakeWiki::empty();
        wiki.diffs.insert(2, DIFF_PAGE.to_string());
        let mut driver = driver(wiki, publisher.clone(), &dir);
        let mut state = CycleState::default();
        state.tasks.push_back(Task {
            page_id: 1,
            page_name: "broken".to_string(),
        });
        state.tasks.push_back(Task {
            page_id: 2,
            page_name: "fine".to_string(),
        });

        driver.run_cycle(&mut state).await;

        // The healthy task still generated and published.
        assert_eq!(publisher.captions().len(), 1);
        // The broken one waits for the next cycle.
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks.front().unwrap().page_id, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_failure_still_dispatches_queued_posts() {
        let dir = TempDir::new().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let mut wiki = FakeWiki::empty();
        wiki.feed_fails = true;
        let mut driver = driver(wiki, publisher.clone(), &dir);
        let mut state = CycleState::default();
        state.posts.push_back(PostJob {
            caption: "leftover".to_string(),
            image_path: dir.path().join("old.jpg"),
        });

        driver.run_cycle(&mut state).await;

        assert_eq!(publisher.captions(), vec!["leftover".to_string()]);
        assert!(state.posts.is_empty());
    }
}
