//! Revision-guarded patch protocol shared by the party and the local member.
//!
//! A patch is sent with the locally known revision. When the service answers
//! with a stale revision conflict the authoritative revision from the error
//! replaces the local one and the same patch is sent again. There is no retry
//! cap and no backoff: under sustained contention this can loop for as long
//! as other writers keep winning.

use crate::error::{PartyError, Result};
use crate::lock::LockEvent;
use async_trait::async_trait;
use indexmap::IndexMap;
use party_http::{ConfigPatch, MetaPatch};
use std::mem::Discriminant;
use tokio::sync::{watch, Mutex, MutexGuard};

/// Largest update the service accepts in a single patch.
pub const MAX_PATCH_KEYS: usize = 30;

/// Arguments of a single [`Patchable::patch`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchRequest {
    pub updated: IndexMap<String, String>,
    pub deleted: Vec<String>,
    pub overridden: IndexMap<String, String>,
    pub config: Option<ConfigPatch>,
    /// How many leading schema entries to send when `updated` is empty.
    pub max: Option<usize>,
}

impl PatchRequest {
    #[must_use]
    pub fn updated(updated: IndexMap<String, String>) -> Self {
        Self {
            updated,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_deleted(mut self, deleted: Vec<String>) -> Self {
        self.deleted = deleted;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ConfigPatch) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

/// Locks and readiness flag guarding one patchable entity.
#[derive(Debug)]
pub struct PatchGate {
    patch_lock: Mutex<()>,
    edit_lock: LockEvent,
    ready: watch::Sender<bool>,
}

impl PatchGate {
    #[must_use]
    pub fn new(ready: bool) -> Self {
        let (tx, _) = watch::channel(ready);
        Self {
            patch_lock: Mutex::new(()),
            edit_lock: LockEvent::new(),
            ready: tx,
        }
    }

    pub async fn lock_patch(&self) -> MutexGuard<'_, ()> {
        self.patch_lock.lock().await
    }

    #[inline]
    #[must_use]
    pub fn edit_lock(&self) -> &LockEvent {
        &self.edit_lock
    }

    /// True while a batched edit is collecting mutator deltas.
    #[inline]
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.edit_lock.is_locked()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.send_replace(ready);
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

/// An entity whose schema is mirrored remotely through revision-guarded
/// patches.
#[async_trait]
pub trait Patchable: Send + Sync {
    fn gate(&self) -> &PatchGate;

    fn revision(&self) -> u64;

    fn set_revision(&self, revision: u64);

    /// The first `max` encoded schema entries.
    fn schema_head(&self, max: usize) -> IndexMap<String, String>;

    /// Drop any transport config collected during an edit.
    fn clear_config_cache(&self);

    /// Send one patch attempt at `revision`.
    async fn do_patch(
        &self,
        patch: &MetaPatch,
        config: Option<&ConfigPatch>,
        revision: u64,
    ) -> party_http::Result<()>;

    /// Send `request`, retrying stale revision conflicts until the service
    /// accepts it or fails with any other error.
    async fn patch(&self, request: PatchRequest) -> Result<()> {
        let gate = self.gate();
        let _patch_guard = gate.lock_patch().await;

        let result = async {
            gate.wait_ready().await;
            loop {
                let mut updated = if request.updated.is_empty() {
                    self.schema_head(request.max.unwrap_or(1))
                } else {
                    request.updated.clone()
                };
                for key in &request.deleted {
                    updated.shift_remove(key);
                }

                let patch = MetaPatch::new(
                    updated,
                    request.deleted.clone(),
                    request.overridden.clone(),
                );
                let revision = self.revision();
                tracing::debug!(
                    "[PartyPatch] sending {} updated / {} deleted at revision {}",
                    patch.update.len(),
                    patch.delete.len(),
                    revision
                );

                match self.do_patch(&patch, request.config.as_ref(), revision).await {
                    Ok(()) => {
                        self.set_revision(revision + 1);
                        return Ok(());
                    }
                    Err(err) if err.is_stale_revision() => {
                        let Some(current) = err.stale_revision() else {
                            return Err(PartyError::Http(err));
                        };
                        tracing::warn!(
                            "[PartyPatch] stale revision {}, service is at {}; retrying",
                            revision,
                            current
                        );
                        self.set_revision(current);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        .await;

        self.clear_config_cache();
        result
    }
}

/// Commands that can be batched into a single edit.
pub trait Command: Clone {
    /// Identity used for deduplication. Two commands with the same tag
    /// write the same keys.
    fn tag(&self) -> Discriminant<Self> {
        std::mem::discriminant(self)
    }
}

/// Keep only the last command of every tag, in the order those last
/// occurrences appear.
#[must_use]
pub fn dedup_commands<C: Command>(commands: Vec<C>) -> Vec<C> {
    let mut out: Vec<C> = Vec::with_capacity(commands.len());
    for cmd in commands {
        let tag = cmd.tag();
        out.retain(|c| c.tag() != tag);
        out.push(cmd);
    }
    out
}

/// Merge `newest` into a stored command list. A tag present in `newest`
/// replaces every stored command with that tag.
#[must_use]
pub fn merge_commands<C: Command>(stored: &[C], newest: Vec<C>) -> Vec<C> {
    let newest = dedup_commands(newest);
    let mut out: Vec<C> = stored
        .iter()
        .filter(|c| !newest.iter().any(|n| n.tag() == c.tag()))
        .cloned()
        .collect();
    out.extend(newest);
    out
}
