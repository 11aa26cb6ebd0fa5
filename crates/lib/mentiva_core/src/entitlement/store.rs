// @zen-component: ENT-UserRecordStore
//
//! User-record store seam and its Postgres implementation.
//!
//! Writes go through conditional single-statement updates so that concurrent
//! writers (a downgrade racing a billing webhook, a link racing an unlink)
//! cannot lose updates: the status write is a compare-and-set on the observed
//! status value.

use async_trait::async_trait;
use sqlx::PgPool;

use super::StoreError;
use crate::models::{
    AccountType, EntitlementRecord, GuildIdentity, SubscriptionStatus,
};

/// Seam to the entitlement-relevant subset of the users table.
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Fetch the entitlement projection of a user record.
    async fn get(&self, user_id: &str) -> Result<Option<EntitlementRecord>, StoreError>;

    /// Compare-and-set the subscription status. Returns `false` when the
    /// stored status no longer equals `expected` (a concurrent writer won);
    /// the caller should re-read and re-decide.
    async fn set_status(
        &self,
        user_id: &str,
        expected: Option<SubscriptionStatus>,
        new: SubscriptionStatus,
    ) -> Result<bool, StoreError>;

    /// Set or clear the linked guild identity pair.
    async fn set_identity(
        &self,
        user_id: &str,
        identity: Option<&GuildIdentity>,
    ) -> Result<(), StoreError>;

    /// Find the user a Discord identity is linked to, if any.
    async fn find_user_by_identity(
        &self,
        discord_id: &str,
    ) -> Result<Option<String>, StoreError>;
}

/// Postgres-backed [`UserRecordStore`].
pub struct PgUserRecordStore {
    pool: PgPool,
}

impl PgUserRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<chrono::DateTime<chrono::Utc>>,
    Option<String>,
    Option<String>,
);

fn record_from_row(row: UserRow) -> Result<EntitlementRecord, StoreError> {
    let (
        id,
        email,
        display_name,
        account_type,
        subscription_status,
        stripe_customer_id,
        current_period_end,
        discord_id,
        discord_access_token,
    ) = row;

    let account_type = AccountType::parse(&account_type).ok_or(StoreError::InvalidColumn {
        field: "account_type",
        value: account_type.clone(),
    })?;

    let subscription_status = match subscription_status {
        None => None,
        Some(s) => Some(SubscriptionStatus::parse(&s).ok_or(StoreError::InvalidColumn {
            field: "subscription_status",
            value: s.clone(),
        })?),
    };

    // Both-or-neither invariant on the identity pair; a half-written pair is
    // treated as corrupt rather than silently half-used.
    let guild_identity = match (discord_id, discord_access_token) {
        (Some(discord_id), Some(access_token)) => Some(GuildIdentity {
            discord_id,
            access_token,
        }),
        (None, None) => None,
        (Some(id), None) | (None, Some(id)) => {
            return Err(StoreError::InvalidColumn {
                field: "discord identity pair",
                value: id,
            });
        }
    };

    Ok(EntitlementRecord {
        id,
        email,
        display_name,
        account_type,
        subscription_status,
        stripe_customer_id,
        current_period_end,
        guild_identity,
    })
}

#[async_trait]
impl UserRecordStore for PgUserRecordStore {
    async fn get(&self, user_id: &str) -> Result<Option<EntitlementRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text, email, name, account_type::text, subscription_status::text, \
                    stripe_customer_id, current_period_end, discord_id, discord_access_token \
             FROM users WHERE id = $1::uuid",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn set_status(
        &self,
        user_id: &str,
        expected: Option<SubscriptionStatus>,
        new: SubscriptionStatus,
    ) -> Result<bool, StoreError> {
        // IS NOT DISTINCT FROM makes the precondition hold for NULL too.
        let result = sqlx::query(
            "UPDATE users SET subscription_status = $3::subscription_status \
             WHERE id = $1::uuid \
               AND subscription_status IS NOT DISTINCT FROM $2::subscription_status",
        )
        .bind(user_id)
        .bind(expected.map(|s| s.as_str()))
        .bind(new.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_identity(
        &self,
        user_id: &str,
        identity: Option<&GuildIdentity>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET discord_id = $2, discord_access_token = $3 WHERE id = $1::uuid",
        )
        .bind(user_id)
        .bind(identity.map(|i| i.discord_id.as_str()))
        .bind(identity.map(|i| i.access_token.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_identity(
        &self,
        discord_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let row =
            sqlx::query_scalar::<_, String>("SELECT id::text FROM users WHERE discord_id = $1")
                .bind(discord_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }
}
