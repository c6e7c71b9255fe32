//! Applies a probe outcome to a check: computes the new state, persists it,
//! and alerts the owner on a real transition.

use std::sync::Arc;

use tracing::{info, warn};

use super::types::{CheckState, Outcome};
use crate::notify::Notifier;
use crate::store::models::Check;
use crate::store::{Collection, RecordStore, RecordStoreExt, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub previous_state: Option<CheckState>,
    pub new_state: CheckState,
    pub alerted: bool,
    pub alert_delivered: bool,
}

/// A first probe only sets the baseline. After that, alert on any change.
pub fn should_alert(check: &Check, new_state: CheckState) -> bool {
    check.last_checked.is_some() && check.state != Some(new_state)
}

pub fn alert_message(check: &Check, new_state: CheckState) -> String {
    format!(
        "Alert: Your check for {} {} is currently {}",
        check.method.as_upper(),
        check.target(),
        new_state
    )
}

pub struct OutcomeProcessor {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeProcessor {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Persist the probed check and maybe alert.
    ///
    /// The write always happens before the alert. If it fails nothing is sent;
    /// if the alert fails the write stands.
    pub async fn process(&self, mut check: Check, outcome: &Outcome, now_ms: i64) -> Result<ProcessReport, StoreError> {
        let new_state = outcome.state_for(&check.success_codes);
        let alert = should_alert(&check, new_state);
        let previous_state = check.state;

        check.state = Some(new_state);
        check.last_checked = Some(now_ms);
        self.store.update_from(Collection::Checks, &check.id, &check).await?;

        let mut report = ProcessReport { previous_state, new_state, alerted: false, alert_delivered: false };
        if !alert {
            return Ok(report);
        }

        report.alerted = true;
        let message = alert_message(&check, new_state);
        info!(check_id = %check.id, "State changed: {}", message);

        match self.notifier.send(&check.phone_number, &message).await {
            Ok(()) => report.alert_delivered = true,
            Err(e) => warn!(check_id = %check.id, "Failed to deliver alert: {}", e),
        }

        Ok(report)
    }
}
