use serde::Deserialize;
use watch_logging::watch_warn;

use wikiwatch_core::WatchEntry;

use crate::{FailureKind, FetchError};

/// One day-group of the recent-edit feed, newest edits first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub day: String,
    pub entries: Vec<WatchEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    pagename: String,
    pageid: u64,
    old: String,
}

/// Parses the feed response into ordered day-groups.
///
/// The response nests day-groups under `recent.<plugin key>` as a JSON
/// object; serde_json's preserve_order keeps them in feed order, which is
/// most-recent day first. Rows whose age text does not match the
/// `^\d+[smhd]$` convention are dropped with a warning.
pub fn parse_feed(body: &str, plugin_key: &str) -> Result<Vec<DayGroup>, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| FetchError::new(FailureKind::MalformedFeed, err.to_string()))?;

    let day_map = value
        .get("recent")
        .and_then(|recent| recent.get(plugin_key))
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| {
            FetchError::new(
                FailureKind::MalformedFeed,
                format!("missing recent.{plugin_key} day map"),
            )
        })?;

    let mut groups = Vec::with_capacity(day_map.len());
    for (day, rows) in day_map {
        let raw: Vec<RawEntry> = serde_json::from_value(rows.clone())
            .map_err(|err| FetchError::new(FailureKind::MalformedFeed, err.to_string()))?;
        let entries = raw
            .into_iter()
            .filter_map(|row| {
                let entry = WatchEntry {
                    page_id: row.pageid,
                    page_name: row.pagename,
                    age_text: row.old,
                };
                if entry.age_seconds().is_none() {
                    watch_warn!(
                        "dropping feed row for page {} with unreadable age {:?}",
                        entry.page_id,
                        entry.age_text
                    );
                    return None;
                }
                Some(entry)
            })
            .collect();
        groups.push(DayGroup {
            day: day.clone(),
            entries,
        });
    }
    Ok(groups)
}
