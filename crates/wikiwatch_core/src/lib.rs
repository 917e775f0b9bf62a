//! Wikiwatch core: pure change model and caption compression.
mod caption;
mod change;
mod watch;

pub use caption::{compose_caption, CAPTION_LIMIT, ELLIPSIS_MARKER};
pub use change::{ChangeKind, ChangeLine};
pub use watch::{PostJob, Task, WatchEntry};
