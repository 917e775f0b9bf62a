use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use watch_logging::{watch_debug, watch_info};

use wikiwatch_core::Task;

use crate::dedup::{DedupStore, PersistError};
use crate::feed::DayGroup;
use crate::types::FetchError;

/// Only today's and yesterday's day-groups are examined.
const DAY_GROUP_LIMIT: usize = 2;
/// Entries older than this signal the end of the interesting window.
const STOP_AGE_SECS: u64 = 5 * 3600;
/// Eager hashing runs while the staged map holds at most this many
/// entries, so up to four pages get sampled unconditionally.
const EAGER_STAGE_MAX: usize = 3;
/// Stop signals are ignored until this many hashes have been staged.
const MIN_STAGED: usize = 3;

/// Source of current content hashes, one network fetch per call.
#[async_trait]
pub trait PageHasher: Send + Sync {
    async fn page_hash(&self, page_id: u64) -> Result<String, FetchError>;
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Walks the watch window and decides which pages are new work.
///
/// Entries survive into Tasks unless filtered as too old or as
/// already-reported (prior hash unchanged). Both filters set a stop flag;
/// scanning still continues while fewer than [`MIN_STAGED`] hashes are
/// staged so the fresh sample never starves, and otherwise breaks out of
/// day and entry loop alike. After each day-group the store is replaced
/// wholesale by the staged hashes accumulated so far and persisted, so a
/// hash failure later in the scan cannot roll back earlier day-groups.
pub async fn scan_watch_window<H>(
    feed: &[DayGroup],
    store: &mut DedupStore,
    hasher: &H,
) -> Result<Vec<Task>, ScanError>
where
    H: PageHasher + ?Sized,
{
    let mut tasks = Vec::new();
    let mut staged: HashMap<u64, String> = HashMap::new();

    for group in feed.iter().take(DAY_GROUP_LIMIT) {
        let mut stop_after_group = false;
        for entry in &group.entries {
            let Some(age) = entry.age_seconds() else {
                // The feed parser already drops unreadable ages.
                continue;
            };

            if staged.len() <= EAGER_STAGE_MAX {
                let hash = hasher.page_hash(entry.page_id).await?;
                staged.insert(entry.page_id, hash);
            }

            if age > STOP_AGE_SECS {
                stop_after_group = true;
                if staged.len() < MIN_STAGED {
                    continue;
                }
                break;
            }

            if let Some(prior) = store.hash_for(entry.page_id) {
                let current = match staged.get(&entry.page_id) {
                    Some(hash) => hash.clone(),
                    None => hasher.page_hash(entry.page_id).await?,
                };
                if current == prior {
                    watch_debug!("page {} unchanged since last report", entry.page_id);
                    stop_after_group = true;
                    if staged.len() < MIN_STAGED {
                        continue;
                    }
                    break;
                }
            }

            tasks.push(Task::from(entry));
        }

        store.replace(&staged)?;
        if stop_after_group {
            break;
        }
    }

    if !tasks.is_empty() {
        watch_info!("scan found {} new pages", tasks.len());
    }
    Ok(tasks)
}
