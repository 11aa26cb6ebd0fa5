//! # mentiva_core
//!
//! Entitlement and guild-membership core for Mentiva.
//!
//! - [`entitlement`] — subscription state machine, [`entitlement::gate::AccessGate`]
//! - [`guild`] — Discord client and [`guild::reconciler::MembershipReconciler`]
//! - [`notify`] — expiry-notice seam
//! - [`models`] — shared domain models

pub mod config;
pub mod entitlement;
pub mod guild;
pub mod models;
pub mod notify;

#[cfg(test)]
pub(crate) mod testsupport;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
