// @zen-component: ENT-Models
//
//! Entitlement domain models.
//!
//! These mirror the entitlement-relevant subset of the `users` table. Wire
//! names are snake_case and match the values the billing webhook handler
//! writes to Postgres.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account type. Admins bypass every entitlement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Standard,
    Admin,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Standard => "standard",
            AccountType::Admin => "admin",
        }
    }

    /// Parse the DB/wire representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(AccountType::Standard),
            "admin" => Some(AccountType::Admin),
            _ => None,
        }
    }
}

/// Subscription status — the single source of truth for access.
///
/// Mutated only by the billing webhook handler (out of this crate) and by
/// the lazy downgrade in [`crate::entitlement::gate::AccessGate`]. The guild
/// reconciler reads it but never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    LifetimeAccess,
    SmmaOnly,
}

impl SubscriptionStatus {
    /// Whether this status grants access to paid content.
    pub fn allows_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active
                | SubscriptionStatus::Trialing
                | SubscriptionStatus::LifetimeAccess
                | SubscriptionStatus::SmmaOnly
        )
    }

    /// Whether this status is eligible for the lazy period-expiry downgrade.
    /// Trial and lifetime plans have no manually-granted period to expire.
    pub fn expires_with_period(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::SmmaOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::LifetimeAccess => "lifetime_access",
            SubscriptionStatus::SmmaOnly => "smma_only",
        }
    }

    /// Parse the DB/wire representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            "lifetime_access" => Some(SubscriptionStatus::LifetimeAccess),
            "smma_only" => Some(SubscriptionStatus::SmmaOnly),
            _ => None,
        }
    }
}

/// Linked Discord identity: the guild member ID plus the OAuth access token
/// used to add them to the guild. Both present or both absent on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildIdentity {
    pub discord_id: String,
    pub access_token: String,
}

/// Projection of a user record onto the fields the entitlement core reads
/// and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementRecord {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub account_type: AccountType,
    /// `None` = never subscribed.
    pub subscription_status: Option<SubscriptionStatus>,
    /// Billing-provider customer reference. Present ⇒ the provider manages
    /// renewal and this core never touches the period.
    pub stripe_customer_id: Option<String>,
    /// Last valid instant of a manually-granted (installment) period.
    /// Meaningful only when `stripe_customer_id` is absent. Preserved through
    /// a downgrade as historical evidence.
    pub current_period_end: Option<DateTime<Utc>>,
    pub guild_identity: Option<GuildIdentity>,
}

impl EntitlementRecord {
    /// Whether the record is a manually-granted plan whose period has lapsed
    /// as of `now`. Billing-managed records (customer ID present) never lapse
    /// here; the provider's webhooks own their lifecycle.
    pub fn manual_period_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status
            .is_some_and(|s| s.expires_with_period())
            && self.stripe_customer_id.is_none()
            && self.current_period_end.is_some_and(|end| now > end)
    }
}

/// Outcome of an access evaluation. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No such user.
    NotFound,
    /// Subscription status outside the allowed set.
    StatusNotAllowed,
    /// The manually-granted period lapsed; the record was downgraded to
    /// `past_due` during this evaluation.
    PeriodExpiredDowngraded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(status: Option<SubscriptionStatus>) -> EntitlementRecord {
        EntitlementRecord {
            id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: None,
            account_type: AccountType::Standard,
            subscription_status: status,
            stripe_customer_id: None,
            current_period_end: None,
            guild_identity: None,
        }
    }

    #[test]
    fn status_roundtrips_through_db_representation() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::LifetimeAccess,
            SubscriptionStatus::SmmaOnly,
        ] {
            assert_eq!(SubscriptionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubscriptionStatus::parse("unknown"), None);
    }

    #[test]
    fn access_set_matches_allowed_statuses() {
        assert!(SubscriptionStatus::Active.allows_access());
        assert!(SubscriptionStatus::Trialing.allows_access());
        assert!(SubscriptionStatus::LifetimeAccess.allows_access());
        assert!(SubscriptionStatus::SmmaOnly.allows_access());
        assert!(!SubscriptionStatus::PastDue.allows_access());
        assert!(!SubscriptionStatus::Canceled.allows_access());
    }

    #[test]
    fn billing_managed_records_never_lapse() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut r = record(Some(SubscriptionStatus::Active));
        r.current_period_end = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(r.manual_period_lapsed(now));

        r.stripe_customer_id = Some("cus_123".into());
        assert!(!r.manual_period_lapsed(now));
    }

    #[test]
    fn lifetime_and_trial_have_no_period_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        for status in [SubscriptionStatus::LifetimeAccess, SubscriptionStatus::Trialing] {
            let mut r = record(Some(status));
            r.current_period_end = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
            assert!(!r.manual_period_lapsed(now));
        }
    }
}
