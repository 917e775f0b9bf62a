use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

/// Seconds per age unit: `s`, `m`, `h`, `d`.
const UNIT_SECONDS: [(char, u64); 4] = [('s', 1), ('m', 60), ('h', 3600), ('d', 86400)];

fn age_pattern() -> &'static Regex {
    static AGE: OnceLock<Regex> = OnceLock::new();
    AGE.get_or_init(|| Regex::new(r"^(\d+)([smhd])$").unwrap())
}

/// One row of the recent-edit feed for a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub page_id: u64,
    pub page_name: String,
    /// Compact duration since the edit, e.g. `"30m"` or `"3d"`.
    pub age_text: String,
}

impl WatchEntry {
    /// Decodes `age_text` into seconds; `None` when the text does not
    /// match the `^\d+[smhd]$` feed convention.
    pub fn age_seconds(&self) -> Option<u64> {
        let caps = age_pattern().captures(&self.age_text)?;
        let amount: u64 = caps[1].parse().ok()?;
        let unit = caps[2].chars().next()?;
        let ratio = UNIT_SECONDS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, secs)| *secs)?;
        Some(amount * ratio)
    }
}

/// A page awaiting caption generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub page_id: u64,
    pub page_name: String,
}

impl From<&WatchEntry> for Task {
    fn from(entry: &WatchEntry) -> Self {
        Self {
            page_id: entry.page_id,
            page_name: entry.page_name.clone(),
        }
    }
}

/// A finished caption plus its rendered picture, awaiting publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostJob {
    pub caption: String,
    pub image_path: PathBuf,
}
