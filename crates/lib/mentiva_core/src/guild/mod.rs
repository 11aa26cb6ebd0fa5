// @zen-component: GLD-GuildCore
//
//! Guild module — Discord membership kept convergent with entitlement state.
//!
//! Guild membership is derived state. It never feeds back into the access
//! decision; [`reconciler::MembershipReconciler`] only pushes the entitlement
//! record's implied desired state out to the guild, tolerating an API that is
//! rate-limited and sometimes down.

pub mod client;
pub mod reconciler;

use async_trait::async_trait;
use thiserror::Error;

use crate::entitlement::StoreError;

/// A guild API call that did not reach one of its defined success states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuildFailure {
    #[error("Guild API returned {0}")]
    Status(u16),

    /// Network error or timeout; treated identically to a non-2xx status.
    #[error("Guild request failed: {0}")]
    Transport(String),
}

/// Result of adding a member. Failures are values, not errors: retry policy
/// belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddMemberOutcome {
    Created,
    AlreadyMember,
    Failed(GuildFailure),
}

/// Result of removing a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveMemberOutcome {
    Removed,
    AlreadyAbsent,
    Failed(GuildFailure),
}

/// Result of a membership query. `Failed` is indeterminate: the caller must
/// not conclude the member is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipStatus {
    Present,
    Absent,
    Failed(GuildFailure),
}

/// Guild membership operations. Implemented by [`client::GuildClient`] over
/// the Discord REST API; mocked in tests.
#[async_trait]
pub trait GuildApi: Send + Sync {
    async fn add_member(&self, discord_id: &str, access_token: &str) -> AddMemberOutcome;
    async fn remove_member(&self, discord_id: &str) -> RemoveMemberOutcome;
    async fn get_membership(&self, discord_id: &str) -> MembershipStatus;
}

/// Errors from the reconciler's user-facing entry points.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Discord identity is already linked to another user")]
    IdentityAlreadyLinked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of an explicit link. `LinkedDegraded` means the identity pair was
/// persisted but the guild join did not complete; the periodic presence
/// check or a later re-link can finish the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    LinkedDegraded,
}

/// Outcome of an explicit unlink. The identity pair is cleared in both
/// cases; `UnlinkedDegraded` means the guild-side removal did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    Unlinked,
    UnlinkedDegraded,
}

/// Outcome of a periodic presence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    StillLinked,
    Unlinked,
}
