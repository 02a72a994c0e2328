use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use super::AccountDiscrepancy;
use crate::primitives::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDrift {
    pub first_detected_at: DateTime<Utc>,
    pub last_posted_at: Option<DateTime<Utc>>,
    pub escalated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEscalation {
    pub discrepancy: AccountDiscrepancy,
    pub first_detected_at: DateTime<Utc>,
}

/// Remembers when drift on an account was first seen. Drift that survives a later
/// posting to the same account was not healed by the sync and gets escalated once.
#[derive(Debug, Default)]
pub struct DriftTracker {
    tracked: HashMap<AccountId, TrackedDrift>,
}

impl DriftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the result of one detection run. Accounts absent from
    /// `discrepancies` are considered resolved and forgotten.
    pub fn observe(
        &mut self,
        discrepancies: &[AccountDiscrepancy],
        now: DateTime<Utc>,
    ) -> Vec<DriftEscalation> {
        self.tracked
            .retain(|id, _| discrepancies.iter().any(|d| d.account_id == *id));

        let mut escalations = Vec::new();
        for discrepancy in discrepancies {
            let tracked = self
                .tracked
                .entry(discrepancy.account_id)
                .or_insert_with(|| TrackedDrift {
                    first_detected_at: now,
                    last_posted_at: discrepancy.last_posted_at,
                    escalated: false,
                });
            if tracked.escalated || discrepancy.last_posted_at <= tracked.last_posted_at {
                continue;
            }
            tracked.escalated = true;
            tracing::error!(
                account_id = %discrepancy.account_id,
                account_code = %discrepancy.account_code,
                cached = %discrepancy.cached_balance,
                expected = %discrepancy.expected_balance,
                first_detected_at = %tracked.first_detected_at,
                "DriftDetected persisted across a posting"
            );
            escalations.push(DriftEscalation {
                discrepancy: discrepancy.clone(),
                first_detected_at: tracked.first_detected_at,
            });
        }
        escalations
    }

    pub fn tracked(&self, account_id: AccountId) -> Option<&TrackedDrift> {
        self.tracked.get(&account_id)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::primitives::AccountType;

    fn drift(account_id: AccountId, last_posted_at: Option<DateTime<Utc>>) -> AccountDiscrepancy {
        AccountDiscrepancy {
            account_id,
            account_code: "1100".to_string(),
            account_type: AccountType::Asset,
            is_header: false,
            cached_balance: dec!(10),
            expected_balance: dec!(0),
            difference: dec!(10),
            last_posted_at,
        }
    }

    #[test]
    fn escalates_only_after_a_later_posting() {
        let mut tracker = DriftTracker::new();
        let account_id = AccountId::new();
        let t0 = Utc::now();

        assert!(tracker.observe(&[drift(account_id, Some(t0))], t0).is_empty());
        assert!(tracker
            .observe(&[drift(account_id, Some(t0))], t0 + Duration::minutes(5))
            .is_empty());

        let later = t0 + Duration::minutes(7);
        let escalated = tracker.observe(&[drift(account_id, Some(later))], later);
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].first_detected_at, t0);
        assert!(tracker.tracked(account_id).unwrap().escalated);

        let again = tracker.observe(
            &[drift(account_id, Some(later + Duration::minutes(1)))],
            later + Duration::minutes(10),
        );
        assert!(again.is_empty());
    }

    #[test]
    fn resolved_drift_is_forgotten() {
        let mut tracker = DriftTracker::new();
        let account_id = AccountId::new();
        let now = Utc::now();
        tracker.observe(&[drift(account_id, None)], now);
        assert_eq!(tracker.len(), 1);
        tracker.observe(&[], now);
        assert!(tracker.is_empty());
        assert!(tracker.tracked(account_id).is_none());
    }

    #[test]
    fn first_posting_after_drift_on_idle_account_escalates() {
        let mut tracker = DriftTracker::new();
        let account_id = AccountId::new();
        let now = Utc::now();
        tracker.observe(&[drift(account_id, None)], now);
        let escalated = tracker.observe(&[drift(account_id, Some(now))], now);
        assert_eq!(escalated.len(), 1);
    }
}
