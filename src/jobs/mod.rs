//! Scheduled reconciliation. Each job is a pure function over the store or
//! archive-storage seam, driven by an interval loop spawned at startup.
//! Every job is safe to re-run; failures are logged and the loop continues.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;

use crate::state::AppState;
use crate::storage::{ArchiveStorage, StorageError};
use crate::store::{Store, StoreError};

/// Batch cap per purge run, sized to the store's batch-write limit.
pub const SESSION_PURGE_BATCH: i64 = 500;

/// Generated download archives live for one day.
pub const ARCHIVE_TTL_HOURS: i64 = 24;

pub const ARCHIVE_PREFIX: &str = "downloads/";

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const DAILY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Delete sessions whose `expires_at` has passed, at most
/// [`SESSION_PURGE_BATCH`] per run. Returns the number deleted.
pub async fn purge_expired_sessions(
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let ids = store.expired_guest_sessions(now, SESSION_PURGE_BATCH).await?;
    if ids.is_empty() {
        tracing::debug!("no expired guest sessions to purge");
        return Ok(0);
    }
    let deleted = store.delete_guest_sessions(&ids).await?;
    tracing::info!(deleted, "purged expired guest sessions");
    Ok(deleted)
}

/// Publish photos for events whose date was yesterday: for each candidate
/// with `event_date + 1 == today`, stamp the event and flip all of its
/// unpublished photos in one batch, with the identical timestamp.
/// Returns the number of photos published.
pub async fn auto_publish_photos(
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let today = now.date_naive();
    let mut published = 0;

    for event in store.auto_publish_candidates().await? {
        if event.event_date.succ_opt() != Some(today) {
            continue;
        }
        let flipped = store.publish_event_photos(event.id, now).await?;
        tracing::info!(event_id = %event.id, photos = flipped, "auto-published event photos");
        published += flipped;
    }
    Ok(published)
}

/// Delete generated download archives older than [`ARCHIVE_TTL_HOURS`].
pub async fn purge_expired_archives(
    storage: &dyn ArchiveStorage,
    now: DateTime<Utc>,
) -> Result<u64, StorageError> {
    let cutoff = now - chrono::Duration::hours(ARCHIVE_TTL_HOURS);
    let mut deleted = 0;

    for object in storage.list(ARCHIVE_PREFIX).await? {
        if object.created_at < cutoff {
            storage.delete(&object.path).await?;
            tracing::info!(path = %object.path, "deleted expired archive");
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Spawn the interval loops. The scheduler guarantees non-overlap per job
/// (one loop per job, ticks are sequential).
pub fn spawn_scheduled_jobs(state: AppState) {
    let purge_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(error) =
                purge_expired_sessions(purge_state.store.as_ref(), Utc::now()).await
            {
                tracing::error!(error = ?error, "session purge failed");
            }
        }
    });

    let publish_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = interval(DAILY_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(error) =
                auto_publish_photos(publish_state.store.as_ref(), Utc::now()).await
            {
                tracing::error!(error = ?error, "auto-publish failed");
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = interval(DAILY_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(error) =
                purge_expired_archives(state.archives.as_ref(), Utc::now()).await
            {
                tracing::error!(error = ?error, "archive purge failed");
            }
        }
    });
}
