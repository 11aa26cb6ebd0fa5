// @zen-component: GLD-MembershipReconciler
//
//! Membership reconciler — link, unlink, status-driven removal, presence sync.
//!
//! All four operations are idempotent and convergent: a failed guild call
//! leaves the entitlement record authoritative and the guild side eligible
//! for repair on the next invocation. Link/unlink for the same user are
//! serialized through a per-user mutex so their record writes and guild
//! calls cannot interleave.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    AddMemberOutcome, GuildApi, LinkOutcome, MembershipStatus, PresenceOutcome, ReconcileError,
    RemoveMemberOutcome, UnlinkOutcome,
};
use crate::entitlement::store::UserRecordStore;
use crate::models::{GuildIdentity, SubscriptionStatus};

pub struct MembershipReconciler {
    store: Arc<dyn UserRecordStore>,
    guild: Arc<dyn GuildApi>,
    /// Per-user serialization for link/unlink and identity clearing.
    /// Entries are evicted once no task holds or waits on them.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MembershipReconciler {
    pub fn new(store: Arc<dyn UserRecordStore>, guild: Arc<dyn GuildApi>) -> Self {
        Self {
            store,
            guild,
            locks: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a user's lock entry once nothing else holds it.
    ///
    /// `remove_if` holds the shard lock and `user_lock` clones through the
    /// same shard, so a strong count of 1 cannot race a new clone.
    fn evict_idle_lock(&self, user_id: &str) {
        self.locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Link a Discord identity to a user and join them to the guild.
    ///
    /// The identity pair is persisted before the guild call: a failed join
    /// degrades the outcome but does not undo the link, since the presence
    /// check or a later re-link can complete the join. Calling again with an
    /// identity that is already linked to the same user is a no-conflict
    /// re-link (the guild add is idempotent).
    pub async fn link(
        &self,
        user_id: &str,
        discord_id: &str,
        access_token: &str,
    ) -> Result<LinkOutcome, ReconcileError> {
        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.link_locked(user_id, discord_id, access_token).await
        };
        drop(lock);
        self.evict_idle_lock(user_id);
        result
    }

    async fn link_locked(
        &self,
        user_id: &str,
        discord_id: &str,
        access_token: &str,
    ) -> Result<LinkOutcome, ReconcileError> {
        if self.store.get(user_id).await?.is_none() {
            return Err(ReconcileError::NotFound(user_id.to_string()));
        }

        if let Some(owner) = self.store.find_user_by_identity(discord_id).await? {
            if owner != user_id {
                return Err(ReconcileError::IdentityAlreadyLinked);
            }
        }

        let identity = GuildIdentity {
            discord_id: discord_id.to_string(),
            access_token: access_token.to_string(),
        };
        self.store.set_identity(user_id, Some(&identity)).await?;

        match self.guild.add_member(discord_id, access_token).await {
            AddMemberOutcome::Created => {
                info!(user_id, discord_id, "linked and joined guild");
                Ok(LinkOutcome::Linked)
            }
            AddMemberOutcome::AlreadyMember => {
                debug!(user_id, discord_id, "linked; already a guild member");
                Ok(LinkOutcome::Linked)
            }
            AddMemberOutcome::Failed(f) => {
                warn!(user_id, discord_id, failure = %f, "linked but guild join incomplete");
                Ok(LinkOutcome::LinkedDegraded)
            }
        }
    }

    /// Unlink the user's Discord identity and remove them from the guild.
    ///
    /// The pair is cleared even when the guild removal fails; a stale guild
    /// membership is preferable to a record pointing at an identity the user
    /// asked to disconnect.
    pub async fn unlink(&self, user_id: &str) -> Result<UnlinkOutcome, ReconcileError> {
        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.unlink_locked(user_id).await
        };
        drop(lock);
        self.evict_idle_lock(user_id);
        result
    }

    async fn unlink_locked(&self, user_id: &str) -> Result<UnlinkOutcome, ReconcileError> {
        let record = self
            .store
            .get(user_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(user_id.to_string()))?;

        let Some(identity) = record.guild_identity else {
            return Ok(UnlinkOutcome::Unlinked);
        };

        let removal = self.guild.remove_member(&identity.discord_id).await;
        self.store.set_identity(user_id, None).await?;

        match removal {
            RemoveMemberOutcome::Removed | RemoveMemberOutcome::AlreadyAbsent => {
                info!(user_id, discord_id = %identity.discord_id, "unlinked");
                Ok(UnlinkOutcome::Unlinked)
            }
            RemoveMemberOutcome::Failed(f) => {
                warn!(
                    user_id,
                    discord_id = %identity.discord_id,
                    failure = %f,
                    "unlinked but guild removal incomplete"
                );
                Ok(UnlinkOutcome::UnlinkedDegraded)
            }
        }
    }

    /// React to a subscription status change.
    ///
    /// Removes the user from the guild when the new status no longer grants
    /// access. The identity pair stays on the record: a user who resubscribes
    /// can be re-added without re-authorizing. Called from the hot access
    /// path, so it absorbs every error.
    pub async fn on_subscription_changed(&self, user_id: &str, new_status: SubscriptionStatus) {
        if new_status.allows_access() {
            return;
        }

        let record = match self.store.get(user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(user_id, error = %e, "status-change reconciliation could not read record");
                return;
            }
        };

        let Some(identity) = record.guild_identity else {
            return;
        };

        match self.guild.remove_member(&identity.discord_id).await {
            RemoveMemberOutcome::Removed => {
                info!(user_id, discord_id = %identity.discord_id, "removed from guild after status change");
            }
            RemoveMemberOutcome::AlreadyAbsent => {
                debug!(user_id, discord_id = %identity.discord_id, "already absent from guild");
            }
            RemoveMemberOutcome::Failed(f) => {
                warn!(
                    user_id,
                    discord_id = %identity.discord_id,
                    failure = %f,
                    "guild removal after status change incomplete"
                );
            }
        }
    }

    /// Periodic presence check, invoked out-of-band.
    ///
    /// Only a confirmed-absent response unlinks: a user who left the guild
    /// on their own has their pair cleared. Indeterminate responses (429,
    /// 5xx, timeouts) keep the link; severing a valid link on a transient
    /// failure is the worse error.
    pub async fn sync_presence(&self, user_id: &str) -> Result<PresenceOutcome, ReconcileError> {
        let record = self
            .store
            .get(user_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(user_id.to_string()))?;

        let Some(identity) = record.guild_identity else {
            return Ok(PresenceOutcome::StillLinked);
        };

        match self.guild.get_membership(&identity.discord_id).await {
            MembershipStatus::Present => Ok(PresenceOutcome::StillLinked),
            MembershipStatus::Absent => {
                let lock = self.user_lock(user_id);
                let result = {
                    let _guard = lock.lock().await;
                    self.clear_identity_if_unchanged(user_id, &identity).await
                };
                drop(lock);
                self.evict_idle_lock(user_id);
                result
            }
            MembershipStatus::Failed(f) => {
                debug!(user_id, failure = %f, "presence check indeterminate; keeping link");
                Ok(PresenceOutcome::StillLinked)
            }
        }
    }

    /// Clear the identity pair only if it is still the one the presence
    /// check observed; a concurrent link may have written a new pair.
    async fn clear_identity_if_unchanged(
        &self,
        user_id: &str,
        observed: &GuildIdentity,
    ) -> Result<PresenceOutcome, ReconcileError> {
        let current = self.store.get(user_id).await?.and_then(|r| r.guild_identity);
        match current {
            Some(cur) if cur.discord_id == observed.discord_id => {
                self.store.set_identity(user_id, None).await?;
                info!(user_id, discord_id = %observed.discord_id, "left guild out-of-band; unlinked");
                Ok(PresenceOutcome::Unlinked)
            }
            _ => Ok(PresenceOutcome::StillLinked),
        }
    }

    #[cfg(test)]
    pub(crate) fn lock_table_len(&self) -> usize {
        self.locks.len()
    }
}
