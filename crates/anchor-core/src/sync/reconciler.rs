//! Pull-and-merge synchronization of the anchor collection and profile.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Utc};
use tokio::sync::watch;
use tokio::time::timeout;

use super::api::AnchorApi;
use super::merge::merge_anchors;
use super::normalize::normalize_anchor;
use super::profile::{build_profile, ProfileCache, UserProfile};
use crate::anchor::{AnchorStore, SharedAnchorStore};
use crate::error::SyncError;
use crate::storage::SyncConfig;

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_PROFILE_ANCHOR_LIMIT: u32 = 5;

type NowFn = dyn Fn() -> DateTime<FixedOffset> + Send + Sync;

/// Result of a sync attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced {
        /// Collection size after the merge.
        total: usize,
        /// Remote records fetched.
        remote: usize,
        /// Remote records dropped by normalization (no id).
        skipped: usize,
        at: DateTime<Utc>,
    },
    /// A newer sync started before this one committed. Nothing was written.
    Superseded,
}

/// Reconciles the shared [`AnchorStore`] with the remote API.
pub struct SyncReconciler<A: AnchorApi> {
    api: A,
    store: SharedAnchorStore,
    profile: Mutex<ProfileCache>,
    generation: watch::Sender<u64>,
    timeout: Duration,
    profile_anchor_limit: u32,
    now: Arc<NowFn>,
}

impl<A: AnchorApi> SyncReconciler<A> {
    pub fn new(api: A, store: SharedAnchorStore) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            api,
            store,
            profile: Mutex::new(ProfileCache::default()),
            generation,
            timeout: DEFAULT_SYNC_TIMEOUT,
            profile_anchor_limit: DEFAULT_PROFILE_ANCHOR_LIMIT,
            now: Arc::new(|| Local::now().fixed_offset()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_profile_anchor_limit(mut self, limit: u32) -> Self {
        self.profile_anchor_limit = limit;
        self
    }

    /// Apply timeout and preview limit from `[sync]`.
    pub fn with_config(self, config: &SyncConfig) -> Self {
        self.with_timeout(Duration::from_secs(config.timeout_secs))
            .with_profile_anchor_limit(config.profile_anchor_limit)
    }

    /// Override the wall clock (local time, for stabilize decay).
    pub fn with_now(mut self, now: impl Fn() -> DateTime<FixedOffset> + Send + Sync + 'static) -> Self {
        self.now = Arc::new(now);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &SharedAnchorStore {
        &self.store
    }

    /// Last successfully fetched profile.
    pub fn profile(&self) -> Option<UserProfile> {
        self.profile_cache().profile().cloned()
    }

    pub fn profile_error(&self) -> Option<String> {
        self.profile_cache().error().map(str::to_string)
    }

    pub fn profile_last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.profile_cache().last_fetched_at()
    }

    fn profile_cache(&self) -> MutexGuard<'_, ProfileCache> {
        self.profile.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_store(&self) -> MutexGuard<'_, AnchorStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, ticket: u64) -> bool {
        *self.generation.borrow() == ticket
    }

    /// Pull remote anchors and merge them into the store.
    ///
    /// On failure the error is recorded in the store's error slot and the
    /// collection is left untouched. A newer call supersedes this one: the
    /// in-flight fetch is dropped and `SyncOutcome::Superseded` returned.
    pub async fn sync_anchors(&self) -> Result<SyncOutcome, SyncError> {
        let mut ticket = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            ticket = *g;
        });
        let mut newer = self.generation.subscribe();
        tracing::debug!(ticket, "anchor sync started");

        let fetched = tokio::select! {
            res = timeout(self.timeout, self.api.fetch_anchors()) => res,
            _ = newer.wait_for(|g| *g != ticket) => {
                tracing::debug!(ticket, "anchor sync superseded in flight");
                return Ok(SyncOutcome::Superseded);
            }
        };

        let raw = match fetched {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(self.fail_anchor_sync(ticket, e)),
            Err(_) => {
                let e = SyncError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                };
                return Err(self.fail_anchor_sync(ticket, e));
            }
        };

        let now = (self.now)().with_timezone(&Utc);
        let remote_count = raw.len();
        let remote: Vec<_> = raw
            .iter()
            .filter_map(|value| {
                let anchor = normalize_anchor(value, now);
                if anchor.is_none() {
                    tracing::warn!("skipping remote anchor without id");
                }
                anchor
            })
            .collect();
        let skipped = remote_count - remote.len();

        let mut store = self.lock_store();
        if !self.is_current(ticket) {
            tracing::debug!(ticket, "anchor sync superseded before commit");
            return Ok(SyncOutcome::Superseded);
        }
        let merged = merge_anchors(store.anchors(), remote);
        let total = merged.len();
        store.set_anchors(merged);
        store.mark_synced(now);
        drop(store);

        tracing::info!(total, remote = remote_count, skipped, "anchor sync complete");
        Ok(SyncOutcome::Synced {
            total,
            remote: remote_count,
            skipped,
            at: now,
        })
    }

    fn fail_anchor_sync(&self, ticket: u64, err: SyncError) -> SyncError {
        if self.is_current(ticket) {
            tracing::warn!("anchor sync failed: {err}");
            self.lock_store().set_error(err.to_string());
        }
        err
    }

    /// Refresh the cached user profile. Never touches the anchor collection.
    pub async fn sync_user_profile(&self) -> Result<UserProfile, SyncError> {
        let limit = self.profile_anchor_limit;
        let fetch = async {
            tokio::try_join!(
                self.api.fetch_user(),
                self.api.fetch_stats(),
                self.api.fetch_active_anchors(limit),
            )
        };

        let result = match timeout(self.timeout, fetch).await {
            Ok(Ok((user, stats, active))) => {
                build_profile(&user, &stats, &active, limit, &(self.now)())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SyncError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        };

        let mut cache = self.profile_cache();
        match result {
            Ok(profile) => {
                tracing::info!(
                    anchors = profile.active_anchors.len(),
                    "profile refreshed"
                );
                cache.replace(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                tracing::warn!("profile sync failed: {e}");
                cache.set_error(e.to_string());
                Err(e)
            }
        }
    }
}
