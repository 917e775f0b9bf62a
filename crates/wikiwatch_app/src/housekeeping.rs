use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, Days, NaiveDateTime, Weekday};
use watch_logging::{watch_info, watch_warn};

/// Time until the next occurrence of `weekday` at `hour`:00 local time.
///
/// Used by the main loop to arm the weekly cleanup timer; recomputed
/// after every select arm, so firing once naturally re-arms for the
/// following week.
pub fn time_until_cleanup(now: NaiveDateTime, weekday: Weekday, hour: u32) -> Duration {
    for day_offset in 0..=7u64 {
        let date = now.date() + Days::new(day_offset);
        if date.weekday() != weekday {
            continue;
        }
        let Some(candidate) = date.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        if candidate > now {
            return (candidate - now).to_std().unwrap_or(Duration::ZERO);
        }
    }
    // Only reachable with an out-of-range hour; retry in a week.
    Duration::from_secs(7 * 24 * 3600)
}

/// Deletes leftover picture files from published (or abandoned) posts.
pub fn cleanup_pictures(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            watch_warn!("picture cleanup skipped, cannot read {dir:?}: {err}");
            return;
        }
    };

    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => watch_warn!("could not remove {path:?}: {err}"),
        }
    }
    watch_info!("picture cleanup removed {removed} files");
}
