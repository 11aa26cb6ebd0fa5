// @zen-component: ENT-EntitlementCore
//
//! Entitlement module — subscription state machine and access gating.
//!
//! [`store::UserRecordStore`] is the seam to the users table;
//! [`gate::AccessGate`] is the authorization decision function every gated
//! request goes through, including the lazy downgrade of lapsed
//! manually-granted plans.

pub mod gate;
pub mod store;

use thiserror::Error;

/// Errors from the user-record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Invalid {field} value in users row: {value}")]
    InvalidColumn { field: &'static str, value: String },
}
