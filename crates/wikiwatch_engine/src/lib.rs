//! Wikiwatch engine: feed scanning, diff extraction and publish pipeline IO.
mod decode;
mod dedup;
mod dispatch;
mod extract;
mod feed;
mod fetch;
mod hash;
mod publish;
mod render;
mod retry;
mod scan;
mod types;

pub use decode::{decode_page, DecodeError};
pub use dedup::{DedupStore, PersistError};
pub use dispatch::{DispatchSettings, PauseGate, PublishDispatcher};
pub use extract::{diff_container_html, extract_change_lines};
pub use feed::{parse_feed, DayGroup};
pub use fetch::{FetchSettings, WikiClient, WikiEndpoints, WikiSource};
pub use hash::content_hash;
pub use publish::{PublishError, Publisher, StatusPublisher};
pub use render::{build_picture_html, CaptionRenderer, RenderError, WkhtmltoimageRenderer};
pub use retry::RetryPolicy;
pub use scan::{scan_watch_window, PageHasher, ScanError};
pub use types::{FailureKind, FetchError};
