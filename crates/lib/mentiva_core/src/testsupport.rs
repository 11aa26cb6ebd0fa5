//! Shared in-memory mocks for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::entitlement::StoreError;
use crate::entitlement::store::UserRecordStore;
use crate::guild::{
    AddMemberOutcome, GuildApi, MembershipStatus, RemoveMemberOutcome,
};
use crate::models::{AccountType, EntitlementRecord, GuildIdentity, SubscriptionStatus};
use crate::notify::{NotificationPort, NotifyError};

/// Build a plain standard-account record.
pub(crate) fn record(id: &str, status: Option<SubscriptionStatus>) -> EntitlementRecord {
    EntitlementRecord {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: Some(id.to_string()),
        account_type: AccountType::Standard,
        subscription_status: status,
        stripe_customer_id: None,
        current_period_end: None,
        guild_identity: None,
    }
}

/// In-memory [`UserRecordStore`] with the same compare-and-set semantics as
/// the Postgres implementation.
pub(crate) struct MemoryStore {
    records: Mutex<HashMap<String, EntitlementRecord>>,
    pub status_writes: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            status_writes: AtomicU32::new(0),
        }
    }

    pub fn insert(&self, record: EntitlementRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn get_sync(&self, user_id: &str) -> Option<EntitlementRecord> {
        self.records.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl UserRecordStore for MemoryStore {
    async fn get(&self, user_id: &str) -> Result<Option<EntitlementRecord>, StoreError> {
        Ok(self.get_sync(user_id))
    }

    async fn set_status(
        &self,
        user_id: &str,
        expected: Option<SubscriptionStatus>,
        new: SubscriptionStatus,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(user_id) {
            Some(record) if record.subscription_status == expected => {
                record.subscription_status = Some(new);
                self.status_writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_identity(
        &self,
        user_id: &str,
        identity: Option<&GuildIdentity>,
    ) -> Result<(), StoreError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(user_id) {
            record.guild_identity = identity.cloned();
        }
        Ok(())
    }

    async fn find_user_by_identity(
        &self,
        discord_id: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| {
                r.guild_identity
                    .as_ref()
                    .is_some_and(|i| i.discord_id == discord_id)
            })
            .map(|r| r.id.clone()))
    }
}

/// Notifier that counts sends.
pub(crate) struct CountingNotifier {
    pub sent: AtomicU32,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self {
            sent: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl NotificationPort for CountingNotifier {
    async fn send_expiry_notice(
        &self,
        _email: &str,
        _display_name: Option<&str>,
    ) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Guild API mock returning scripted outcomes, counting calls, and
/// recording which member IDs were added/removed.
pub(crate) struct ScriptedGuild {
    pub add: Mutex<AddMemberOutcome>,
    pub remove: Mutex<RemoveMemberOutcome>,
    pub membership: Mutex<MembershipStatus>,
    pub add_calls: AtomicU32,
    pub remove_calls: AtomicU32,
    pub membership_calls: AtomicU32,
    pub added_ids: Mutex<Vec<String>>,
    pub removed_ids: Mutex<Vec<String>>,
}

impl ScriptedGuild {
    pub fn new() -> Self {
        Self {
            add: Mutex::new(AddMemberOutcome::Created),
            remove: Mutex::new(RemoveMemberOutcome::Removed),
            membership: Mutex::new(MembershipStatus::Present),
            add_calls: AtomicU32::new(0),
            remove_calls: AtomicU32::new(0),
            membership_calls: AtomicU32::new(0),
            added_ids: Mutex::new(Vec::new()),
            removed_ids: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GuildApi for ScriptedGuild {
    async fn add_member(&self, discord_id: &str, _access_token: &str) -> AddMemberOutcome {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.added_ids.lock().unwrap().push(discord_id.to_string());
        self.add.lock().unwrap().clone()
    }

    async fn remove_member(&self, discord_id: &str) -> RemoveMemberOutcome {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.removed_ids.lock().unwrap().push(discord_id.to_string());
        self.remove.lock().unwrap().clone()
    }

    async fn get_membership(&self, _discord_id: &str) -> MembershipStatus {
        self.membership_calls.fetch_add(1, Ordering::SeqCst);
        self.membership.lock().unwrap().clone()
    }
}
