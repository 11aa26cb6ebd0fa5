//! Domain models for the entitlement core.

pub mod entitlement;

pub use entitlement::{
    AccountType, Decision, DenyReason, EntitlementRecord, GuildIdentity, SubscriptionStatus,
};
