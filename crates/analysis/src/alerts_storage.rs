// Path: crates/analysis/src/alerts_storage.rs

//! Confirmation, backoff and vacuum over the keyed alert space.
//!
//! Every candidate alert of a round is `put` here; the storage answers
//! whether the alert should be sent now. `repeats` counts consecutive rounds
//! an identity kept firing, `backoff_threshold` grows multiplicatively on
//! every re-emission, and `vacuum_quota` is reset by every `put`, so an
//! identity that goes silent is deleted after exactly `vacuum_quota` vacuum
//! passes, emitting a "fixed" notification if it had ever been confirmed.

use chainwatch_types::{Alert, AlertType};
use std::collections::HashMap;

/// Default number of silent rounds before an alert identity is vacuumed.
pub const DEFAULT_VACUUM_QUOTA: i64 = 5;
/// Default backoff multiplier between re-emissions of a persistent alert.
pub const DEFAULT_BACKOFF: u32 = 2;
/// Default confirmation requirement for height divergence alerts.
pub const HEIGHT_ALERT_CONFIRMATIONS: u32 = 2;

/// Per-type confirmation requirements; types without an entry require one
/// occurrence.
pub type AlertConfirmations = HashMap<AlertType, u32>;

/// The default confirmation table: only height divergence needs two
/// consecutive rounds.
pub fn default_confirmations() -> AlertConfirmations {
    HashMap::from([(AlertType::Height, HEIGHT_ALERT_CONFIRMATIONS)])
}

#[derive(Debug, Clone)]
struct AlertInfo {
    vacuum_quota: i64,
    repeats: u32,
    backoff_threshold: u32,
    confirmed: bool,
    alert: Alert,
}

/// De-duplicating storage of alert identities.
pub struct AlertsStorage {
    backoff: u32,
    vacuum_quota: i64,
    required_confirmations: AlertConfirmations,
    storage: HashMap<String, AlertInfo>,
}

impl AlertsStorage {
    /// Creates a storage with the given backoff multiplier, vacuum quota and
    /// confirmation table.
    pub fn new(
        backoff: u32,
        vacuum_quota: i64,
        required_confirmations: AlertConfirmations,
    ) -> Self {
        Self {
            backoff,
            vacuum_quota,
            required_confirmations,
            storage: HashMap::new(),
        }
    }

    /// Records one occurrence of `alert` and answers whether it should be
    /// sent now.
    pub fn put(&mut self, alert: &Alert) -> bool {
        if self.vacuum_quota <= 1 {
            // De-duplication is effectively disabled: nothing stored here
            // could outlive even one vacuum stage.
            return true;
        }
        let id = alert.id();
        let (old_repeats, old_backoff, old_confirmed) = match self.storage.get(&id) {
            Some(info) => (info.repeats, info.backoff_threshold, info.confirmed),
            None => (0, 0, false),
        };
        let repeats = old_repeats + 1;
        let required = self
            .required_confirmations
            .get(&alert.alert_type())
            .copied()
            .unwrap_or(1);

        let (info, send) = if !old_confirmed && repeats >= required {
            // Confirmed: reset the repeat counter and start backing off.
            (
                AlertInfo {
                    vacuum_quota: self.vacuum_quota,
                    repeats: 1,
                    backoff_threshold: self.backoff,
                    confirmed: true,
                    alert: alert.clone(),
                },
                true,
            )
        } else if old_confirmed && repeats > old_backoff {
            // Backoff exceeded: re-emit and widen the window.
            (
                AlertInfo {
                    vacuum_quota: self.vacuum_quota,
                    repeats: 1,
                    backoff_threshold: self.backoff * old_backoff,
                    confirmed: true,
                    alert: alert.clone(),
                },
                true,
            )
        } else {
            (
                AlertInfo {
                    vacuum_quota: self.vacuum_quota,
                    repeats,
                    backoff_threshold: old_backoff,
                    confirmed: old_confirmed,
                    alert: alert.clone(),
                },
                false,
            )
        };
        tracing::info!(
            target = "analysis",
            alert = %info.alert,
            repeats = info.repeats,
            backoff_threshold = info.backoff_threshold,
            confirmed = info.confirmed,
            "alert put into storage"
        );
        self.storage.insert(id, info);
        send
    }

    /// Ages every stored identity by one round. Identities whose quota runs
    /// out are deleted; the confirmed ones among them are returned so the
    /// caller can emit "fixed" notifications.
    pub fn vacuum(&mut self) -> Vec<Alert> {
        let mut fixed = Vec::new();
        self.storage.retain(|_, info| {
            info.vacuum_quota -= 1;
            if info.vacuum_quota <= 0 {
                if info.confirmed {
                    fixed.push(info.alert.clone());
                }
                false
            } else {
                true
            }
        });
        fixed
    }

    /// Number of identities currently tracked.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether no identities are tracked.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_types::UnreachableAlert;

    fn unreachable(node: &str) -> Alert {
        Alert::Unreachable(UnreachableAlert {
            ts: 1700000000,
            node: node.to_string(),
        })
    }

    fn height_alert() -> Alert {
        use chainwatch_types::{HeightAlert, HeightGroup};
        Alert::Height(HeightAlert {
            ts: 1700000000,
            groups: vec![
                HeightGroup {
                    height: 100,
                    nodes: vec!["a".to_string(), "b".to_string()],
                },
                HeightGroup {
                    height: 90,
                    nodes: vec!["c".to_string()],
                },
            ],
        })
    }

    fn storage() -> AlertsStorage {
        AlertsStorage::new(DEFAULT_BACKOFF, DEFAULT_VACUUM_QUOTA, default_confirmations())
    }

    #[test]
    fn test_single_confirmation_sends_immediately() {
        let mut s = storage();
        assert!(s.put(&unreachable("a")));
    }

    #[test]
    fn test_height_alert_needs_two_confirmations() {
        let mut s = storage();
        let alert = height_alert();
        assert!(!s.put(&alert), "first occurrence must be held");
        assert!(s.put(&alert), "second consecutive occurrence confirms");
    }

    #[test]
    fn test_backoff_sequence_is_geometric() {
        let mut s = storage();
        let alert = unreachable("a");
        let mut sent_at = Vec::new();
        for round in 1..=15 {
            if s.put(&alert) {
                sent_at.push(round);
            }
        }
        // Sent on confirmation, then again once repeats exceed thresholds of
        // 2, 4 and 8 rounds: the backoff windows double.
        assert_eq!(sent_at, vec![1, 3, 7, 15]);
    }

    #[test]
    fn test_vacuum_emits_fixed_after_quota_rounds_of_silence() {
        let mut s = storage();
        let alert = unreachable("a");
        assert!(s.put(&alert));
        for round in 1..=DEFAULT_VACUUM_QUOTA {
            let fixed = s.vacuum();
            if round < DEFAULT_VACUUM_QUOTA {
                assert!(fixed.is_empty(), "vacuumed early at round {round}");
            } else {
                assert_eq!(fixed.len(), 1);
                assert_eq!(fixed[0].id(), alert.id());
            }
        }
        assert!(s.is_empty());
    }

    #[test]
    fn test_unconfirmed_alerts_vanish_silently() {
        let mut s = storage();
        let alert = height_alert();
        assert!(!s.put(&alert)); // held, never confirmed
        for _ in 0..DEFAULT_VACUUM_QUOTA {
            assert!(s.vacuum().is_empty());
        }
        assert!(s.is_empty());
    }

    #[test]
    fn test_put_resets_the_vacuum_quota() {
        let mut s = storage();
        let alert = unreachable("a");
        s.put(&alert);
        for _ in 0..(DEFAULT_VACUUM_QUOTA - 1) {
            assert!(s.vacuum().is_empty());
        }
        // The identity fires again just before expiry: quota resets.
        s.put(&alert);
        for _ in 0..(DEFAULT_VACUUM_QUOTA - 1) {
            assert!(s.vacuum().is_empty());
        }
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_quota_of_one_short_circuits() {
        let mut s = AlertsStorage::new(DEFAULT_BACKOFF, 1, default_confirmations());
        let alert = height_alert();
        // Every put sends, nothing is stored, nothing is ever fixed.
        assert!(s.put(&alert));
        assert!(s.put(&alert));
        assert!(s.is_empty());
        assert!(s.vacuum().is_empty());
    }
}
