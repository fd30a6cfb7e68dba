use crate::classifier::ClassifierService;
use crate::connectivity::Connectivity;
use crate::db::{self, Pool, TaskPatch};
use crate::history::HistoryArchive;
use crate::model::{PendingTask, ScanRecord, SyncResult, TaskStatus};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

pub const DEFAULT_MAX_RETRIES: i32 = 3;

type Listener = Box<dyn Fn(&SyncResult) + Send + Sync>;

/// Drives queued scans through classification and archival, one at a time,
/// with bounded retry. At most one pass runs per process; overlapping
/// triggers (user action plus a network-restored event) collapse into one.
pub struct SyncManager {
    pool: Pool,
    classifier: Arc<dyn ClassifierService>,
    archive: Arc<dyn HistoryArchive>,
    connectivity: Arc<dyn Connectivity>,
    max_retries: i32,
    pass_running: AtomicBool,
    listeners: Arc<Mutex<HashMap<u64, Listener>>>,
    next_listener_id: AtomicU64,
}

impl SyncManager {
    pub fn new(
        pool: Pool,
        classifier: Arc<dyn ClassifierService>,
        archive: Arc<dyn HistoryArchive>,
        connectivity: Arc<dyn Connectivity>,
        max_retries: i32,
    ) -> Self {
        Self {
            pool,
            classifier,
            archive,
            connectivity,
            max_retries,
            pass_running: AtomicBool::new(false),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Register a callback fired with the `SyncResult` at the end of every
    /// completed pass, including zero-task passes. The returned closure
    /// deregisters it.
    pub fn on_sync_complete<F>(&self, listener: F) -> impl FnOnce() + Send + 'static
    where
        F: Fn(&SyncResult) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .expect("listener registry lock")
            .insert(id, Box::new(listener));
        let listeners = Arc::clone(&self.listeners);
        move || {
            listeners
                .lock()
                .expect("listener registry lock")
                .remove(&id);
        }
    }

    /// Run one sync pass. Never errors: gating conditions and unexpected
    /// failures all come back as a `SyncResult`.
    #[instrument(skip_all)]
    pub async fn sync_pending_tasks(&self) -> SyncResult {
        // The compare-exchange is both the "already running" check and the
        // guard acquisition.
        if self
            .pass_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SyncResult::skipped("sync already in progress");
        }
        if !self.connectivity.is_online().await {
            self.pass_running.store(false, Ordering::SeqCst);
            return SyncResult::skipped("offline");
        }

        let mut synced_count = 0u32;
        let result = match self.run_pass(&mut synced_count).await {
            Ok(result) => result,
            Err(err) => {
                warn!(?err, "sync pass aborted");
                SyncResult {
                    succeeded: false,
                    message: err.to_string(),
                    synced_count,
                }
            }
        };
        self.pass_running.store(false, Ordering::SeqCst);
        self.notify_listeners(&result);
        result
    }

    async fn run_pass(&self, synced_count: &mut u32) -> Result<SyncResult> {
        let pending = db::list_pending_tasks(&self.pool).await?;
        if pending.is_empty() {
            return Ok(SyncResult {
                succeeded: true,
                message: "nothing to sync".to_string(),
                synced_count: 0,
            });
        }

        info!(pending = pending.len(), "sync pass started");
        for task in &pending {
            if !self.connectivity.is_online().await {
                warn!("connectivity lost mid-pass; remaining tasks stay pending");
                break;
            }
            if self.process_task(task).await? {
                *synced_count += 1;
            }
        }

        db::set_last_sync_at(&self.pool, Utc::now()).await?;
        db::purge_done(&self.pool).await?;
        info!(synced = *synced_count, "sync pass finished");
        Ok(SyncResult {
            succeeded: true,
            message: format!("synced {} of {} scans", synced_count, pending.len()),
            synced_count: *synced_count,
        })
    }

    /// Returns true when the task reached `done`. A failed attempt is
    /// bookkept here (retry or terminal failure) and is not an error; only
    /// a storage failure during that bookkeeping propagates.
    async fn process_task(&self, task: &PendingTask) -> Result<bool> {
        match self.attempt_task(task).await {
            Ok(()) => {
                db::update_task(&self.pool, &task.id, TaskPatch::status(TaskStatus::Done)).await?;
                db::delete_task(&self.pool, &task.id).await?;
                info!(task_id = %task.id, "scan synced");
                Ok(true)
            }
            Err(err) => {
                let retries = task.retry_count + 1;
                let next = if retries >= self.max_retries {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Pending
                };
                warn!(
                    ?err,
                    task_id = %task.id,
                    retries,
                    status = next.as_str(),
                    "scan sync attempt failed"
                );
                db::update_task(
                    &self.pool,
                    &task.id,
                    TaskPatch::status(next).with_retry_count(retries),
                )
                .await?;
                Ok(false)
            }
        }
    }

    /// Everything that can fail for one attempt: the in-flight status
    /// write, the classifier call, and the archive append.
    async fn attempt_task(&self, task: &PendingTask) -> Result<()> {
        db::update_task(&self.pool, &task.id, TaskPatch::status(TaskStatus::InFlight)).await?;
        let classification = self.classifier.classify(&task.payload_data).await?;
        let record = ScanRecord::from_classification(task, &classification);
        self.archive.append(&record).await?;
        Ok(())
    }

    fn notify_listeners(&self, result: &SyncResult) {
        let listeners = self.listeners.lock().expect("listener registry lock");
        for listener in listeners.values() {
            listener(result);
        }
    }
}
