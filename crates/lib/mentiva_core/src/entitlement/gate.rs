// @zen-component: ENT-AccessGate
//
//! Access gate — the authorization decision function.
//!
//! Every gated request evaluates here. Expiry of manually-granted plans is
//! detected lazily on this path (there is no scheduler in the platform): the
//! downgrade write is a compare-and-set and sits on the critical path; the
//! expiry notice and the guild removal are detached best-effort tasks
//! dispatched after the write commits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::StoreError;
use super::store::UserRecordStore;
use crate::guild::reconciler::MembershipReconciler;
use crate::models::{AccountType, Decision, DenyReason, EntitlementRecord, SubscriptionStatus};
use crate::notify::NotificationPort;

/// Decision passes per evaluation. Each pass beyond the first exists only to
/// re-read after a compare-and-set conflict with a concurrent writer.
const MAX_DECISION_PASSES: u32 = 3;

pub struct AccessGate {
    store: Arc<dyn UserRecordStore>,
    notifier: Arc<dyn NotificationPort>,
    reconciler: Arc<MembershipReconciler>,
}

impl AccessGate {
    pub fn new(
        store: Arc<dyn UserRecordStore>,
        notifier: Arc<dyn NotificationPort>,
        reconciler: Arc<MembershipReconciler>,
    ) -> Self {
        Self {
            store,
            notifier,
            reconciler,
        }
    }

    /// Evaluate access for a user at the current time.
    pub async fn evaluate(&self, user_id: &str) -> Result<Decision, StoreError> {
        self.evaluate_at(user_id, Utc::now()).await
    }

    /// Evaluate access at an explicit `now`.
    ///
    /// Runs at most [`MAX_DECISION_PASSES`] passes: a compare-and-set
    /// conflict on the downgrade write means a concurrent writer committed
    /// first, and the next pass decides from that writer's committed state.
    /// Either way at most one downgrade write and one notification happen
    /// per expiry.
    pub async fn evaluate_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        for _ in 0..MAX_DECISION_PASSES {
            let Some(record) = self.store.get(user_id).await? else {
                return Ok(Decision::Deny(DenyReason::NotFound));
            };

            if record.account_type == AccountType::Admin {
                return Ok(Decision::Allow);
            }

            let allowed = record
                .subscription_status
                .is_some_and(|s| s.allows_access());
            if !allowed {
                return Ok(Decision::Deny(DenyReason::StatusNotAllowed));
            }

            if record.manual_period_lapsed(now) {
                let applied = self
                    .store
                    .set_status(user_id, record.subscription_status, SubscriptionStatus::PastDue)
                    .await?;
                if applied {
                    info!(user_id, "manual period lapsed; downgraded to past_due");
                    self.dispatch_downgrade_effects(&record);
                    return Ok(Decision::Deny(DenyReason::PeriodExpiredDowngraded));
                }
                // Lost the race against a concurrent writer; re-read and
                // decide from their committed state.
                continue;
            }

            return Ok(Decision::Allow);
        }

        // Every pass lost its compare-and-set: the record is being rewritten
        // underneath us. Deny rather than allow on stale state.
        Ok(Decision::Deny(DenyReason::StatusNotAllowed))
    }

    /// Dispatch the expiry notice and the guild removal as detached tasks.
    /// Neither may delay or fail the caller's request.
    fn dispatch_downgrade_effects(&self, record: &EntitlementRecord) {
        let notifier = Arc::clone(&self.notifier);
        let email = record.email.clone();
        let display_name = record.display_name.clone();
        let user_id = record.id.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_expiry_notice(&email, display_name.as_deref())
                .await
            {
                warn!(user_id, error = %e, "expiry notice failed");
            }
        });

        let reconciler = Arc::clone(&self.reconciler);
        let user_id = record.id.clone();
        tokio::spawn(async move {
            reconciler
                .on_subscription_changed(&user_id, SubscriptionStatus::PastDue)
                .await;
        });
    }
}
