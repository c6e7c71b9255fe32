use std::sync::Arc;

use thiserror::Error;

use super::checker::Checker;
use super::processor::{OutcomeProcessor, ProcessReport};
use super::types::Outcome;
use super::validation::{Rejection, validate_check};
use crate::notify::Notifier;
use crate::store::{Collection, RecordStore, StoreError};

/// Everything the engine needs from the outside world, injected once.
#[derive(Clone)]
pub struct Capabilities {
    pub store: Arc<dyn RecordStore>,
    pub checker: Arc<dyn Checker>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("Could not load check: {0}")]
    Load(#[source] StoreError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Check stored under {key} claims id {id}")]
    Misfiled { key: String, id: String },

    #[error("Could not persist probe result: {0}")]
    Persist(#[source] StoreError),
}

#[derive(Debug, Clone)]
pub struct CheckRun {
    pub check_id: String,
    pub outcome: Outcome,
    pub report: ProcessReport,
}

/// Monitoring executor - runs one check's pipeline:
/// read, validate, probe, process, persist, maybe alert.
pub struct MonitoringExecutor {
    store: Arc<dyn RecordStore>,
    checker: Arc<dyn Checker>,
    processor: OutcomeProcessor,
}

impl MonitoringExecutor {
    pub fn new(capabilities: Capabilities) -> Self {
        let Capabilities { store, checker, notifier } = capabilities;
        Self { processor: OutcomeProcessor::new(store.clone(), notifier), store, checker }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn execute_check(&self, check_id: &str) -> Result<CheckRun, ExecuteError> {
        let record = self.store.read(Collection::Checks, check_id).await.map_err(ExecuteError::Load)?;
        let check = validate_check(&record)?;
        // The processor writes back under `check.id`; it must be this document.
        if check.id != check_id {
            return Err(ExecuteError::Misfiled { key: check_id.to_string(), id: check.id });
        }

        let outcome = self.checker.probe(&check).await;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let check_id = check.id.clone();
        let report = self.processor.process(check, &outcome, now_ms).await.map_err(ExecuteError::Persist)?;

        Ok(CheckRun { check_id, outcome, report })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedChecker;
    use super::*;
    use crate::monitoring::processor::testing::RecordingNotifier;
    use crate::monitoring::types::CheckState;
    use crate::store::MemoryStore;
    use serde_json::json;

    const ID: &str = "abcdefghij0123456789";

    fn executor() -> (Arc<MemoryStore>, Arc<ScriptedChecker>, Arc<RecordingNotifier>, MonitoringExecutor) {
        let store = Arc::new(MemoryStore::new());
        let checker = Arc::new(ScriptedChecker::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let executor = MonitoringExecutor::new(Capabilities {
            store: store.clone(),
            checker: checker.clone(),
            notifier: notifier.clone(),
        });
        (store, checker, notifier, executor)
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let (store, checker, notifier, executor) = executor();
        store
            .create(
                Collection::Checks,
                ID,
                &json!({
                    "id": ID,
                    "phoneNumber": "5551234567",
                    "protocol": "http",
                    "url": "example.com",
                    "method": "get",
                    "successCodes": [200],
                    "timeoutSeconds": 3
                }),
            )
            .await
            .unwrap();
        checker.push(ID, Outcome::response(200)).await;
        checker.push(ID, Outcome::timeout("no response within 3s")).await;

        let first = executor.execute_check(ID).await.unwrap();
        assert_eq!(first.report.new_state, CheckState::Up);
        assert!(!first.report.alerted);
        let stored = store.read(Collection::Checks, ID).await.unwrap();
        assert_eq!(stored["state"], "up");
        assert!(stored["lastChecked"].as_i64().is_some());

        let second = executor.execute_check(ID).await.unwrap();
        assert_eq!(second.report.new_state, CheckState::Down);
        assert!(second.report.alerted);
        let sent = notifier.sent.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5551234567");
        assert!(sent[0].1.contains("GET http://example.com"));
        assert!(sent[0].1.ends_with("down"));
    }

    #[tokio::test]
    async fn test_invalid_record_is_not_probed() {
        let (store, checker, _notifier, executor) = executor();
        store.create(Collection::Checks, ID, &json!({"id": ID, "protocol": "gopher"})).await.unwrap();

        let err = executor.execute_check(ID).await.unwrap_err();

        assert!(matches!(err, ExecuteError::Rejected(_)));
        assert_eq!(checker.probe_count(ID).await, 0);
    }

    #[tokio::test]
    async fn test_record_claiming_another_id_is_not_probed() {
        let (store, checker, _notifier, executor) = executor();
        let other = "zyxwvutsrq9876543210";
        store
            .create(
                Collection::Checks,
                other,
                &json!({
                    "id": other,
                    "phoneNumber": "5551234567",
                    "protocol": "http",
                    "url": "victim.example",
                    "method": "get",
                    "successCodes": [200],
                    "timeoutSeconds": 3
                }),
            )
            .await
            .unwrap();
        store
            .create(
                Collection::Checks,
                ID,
                &json!({
                    "id": other,
                    "phoneNumber": "5551234567",
                    "protocol": "http",
                    "url": "attacker.example",
                    "method": "get",
                    "successCodes": [200],
                    "timeoutSeconds": 3
                }),
            )
            .await
            .unwrap();

        let err = executor.execute_check(ID).await.unwrap_err();

        assert!(matches!(err, ExecuteError::Misfiled { ref key, ref id } if key == ID && id == other));
        assert_eq!(checker.probe_count(other).await, 0);
        let untouched = store.read(Collection::Checks, other).await.unwrap();
        assert_eq!(untouched["url"], "victim.example");
        assert!(untouched.get("state").is_none());
    }

    #[tokio::test]
    async fn test_missing_record() {
        let (_store, _checker, _notifier, executor) = executor();
        let err = executor.execute_check(ID).await.unwrap_err();
        assert!(matches!(err, ExecuteError::Load(e) if e.is_not_found()));
    }
}
