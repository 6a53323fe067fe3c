// src/autosave.rs
//
// Edited payroll rows are persisted through a coalescing queue rather than
// one PUT per keystroke. Writes for the same employee within the settle
// window collapse to the latest value, then one batched save goes out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::engine::PayrollStore;
use crate::model::PayrollRow;

const SETTLE_WINDOW: Duration = Duration::from_millis(600);
const SAVE_RETRIES: u32 = 3;
const SAVE_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<PayrollRow>,
}

impl AutosaveHandle {
    /// Queue one edited row. Later rows for the same employee supersede
    /// earlier ones that have not flushed yet.
    pub fn enqueue(&self, row: PayrollRow) {
        if self.tx.send(row).is_err() {
            warn!("autosave worker gone, dropping row");
        }
    }
}

pub struct Autosave {
    pub handle: AutosaveHandle,
    worker: JoinHandle<()>,
}

impl Autosave {
    pub fn spawn(store: Arc<dyn PayrollStore>, year: i32, month: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, year, month, rx));
        Self {
            handle: AutosaveHandle { tx },
            worker,
        }
    }

    /// Drop the sender and wait for the final flush.
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Err(e) = self.worker.await {
            error!("autosave worker panicked: {e}");
        }
    }
}

async fn run_worker(
    store: Arc<dyn PayrollStore>,
    year: i32,
    month: u32,
    mut rx: mpsc::UnboundedReceiver<PayrollRow>,
) {
    let mut pending: HashMap<i64, PayrollRow> = HashMap::new();
    loop {
        let received = if pending.is_empty() {
            // Nothing buffered, block until the next edit or channel close.
            match rx.recv().await {
                Some(row) => Some(row),
                None => break,
            }
        } else {
            // Buffered rows flush once the edit stream goes quiet.
            match tokio::time::timeout(SETTLE_WINDOW, rx.recv()).await {
                Ok(Some(row)) => Some(row),
                Ok(None) => break,
                Err(_) => None,
            }
        };
        match received {
            Some(row) => {
                pending.insert(row.employee_id, row);
            }
            None => {
                flush(store.as_ref(), year, month, &mut pending).await;
            }
        }
    }
    flush(store.as_ref(), year, month, &mut pending).await;
}

async fn flush(
    store: &dyn PayrollStore,
    year: i32,
    month: u32,
    pending: &mut HashMap<i64, PayrollRow>,
) {
    if pending.is_empty() {
        return;
    }
    let rows: Vec<PayrollRow> = pending.values().cloned().collect();
    let mut delay = SAVE_RETRY_BASE_DELAY;
    for attempt in 1..=SAVE_RETRIES {
        match store.save_payroll(year, month, &rows).await {
            Ok(()) => {
                debug!(rows = rows.len(), "autosave flushed");
                pending.clear();
                return;
            }
            Err(e) if attempt < SAVE_RETRIES => {
                warn!(
                    attempt,
                    "autosave flush failed, retrying in {}ms: {e}",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                // Keep the rows buffered; the next edit restarts the cycle.
                error!(rows = rows.len(), "autosave flush failed after retries: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::backend::BackendError;
    use crate::engine::LegacyEmployeeTotal;

    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<Vec<PayrollRow>>>,
        fail_first: Mutex<u32>,
    }

    #[async_trait]
    impl PayrollStore for RecordingStore {
        async fn compute_payroll(
            &self,
            _year: i32,
            _month: u32,
        ) -> Result<Vec<PayrollRow>, BackendError> {
            Ok(vec![])
        }

        async fn save_payroll(
            &self,
            _year: i32,
            _month: u32,
            rows: &[PayrollRow],
        ) -> Result<(), BackendError> {
            {
                let mut remaining = self.fail_first.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BackendError::RateLimitExceeded);
                }
            }
            self.saves.lock().unwrap().push(rows.to_vec());
            Ok(())
        }

        async fn legacy_totals(
            &self,
            _year: i32,
            _month: u32,
        ) -> Result<Vec<LegacyEmployeeTotal>, BackendError> {
            Ok(vec![])
        }
    }

    fn row(employee_id: i64) -> PayrollRow {
        PayrollRow {
            employee_id,
            ..PayrollRow::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn coalesces_same_employee_edits() {
        let store = Arc::new(RecordingStore::default());
        let autosave = Autosave::spawn(store.clone(), 2025, 3);

        autosave.handle.enqueue(row(1));
        autosave.handle.enqueue(row(1));
        autosave.handle.enqueue(row(2));
        autosave.shutdown().await;

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_failed_flush() {
        let store = Arc::new(RecordingStore::default());
        *store.fail_first.lock().unwrap() = 2;
        let autosave = Autosave::spawn(store.clone(), 2025, 3);

        autosave.handle.enqueue(row(7));
        autosave.shutdown().await;

        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }
}
