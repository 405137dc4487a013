pub mod due_reminder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::db::StoreError;
use crate::services::review_states::ReviewStateService;

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    service: Arc<ReviewStateService>,
    leader: AtomicBool,
}

impl WorkerManager {
    pub async fn new(service: Arc<ReviewStateService>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            service,
            leader: AtomicBool::new(false),
        })
    }

    pub fn is_leader(&self) -> bool {
        self.leader.load(Ordering::Relaxed)
    }

    pub async fn start(&self, reminder_enabled: bool, reminder_schedule: &str) -> Result<(), WorkerError> {
        let leader = std::env::var("WORKER_LEADER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        if !leader {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        self.leader.store(true, Ordering::Relaxed);
        info!("Starting workers (leader mode)");

        let scheduler = self.scheduler.lock().await;

        if reminder_enabled {
            let service = Arc::clone(&self.service);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(reminder_schedule, move |_uuid, _lock| {
                let service = Arc::clone(&service);
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        result = due_reminder::scan_due_reminders(service) => {
                            if let Err(e) = result {
                                error!(error = %e, "Due reminder worker error");
                            }
                        }
                    }
                })
            })
            .map_err(WorkerError::Scheduler)?;
            scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
            info!(schedule = %reminder_schedule, "Due reminder worker scheduled");
        }

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        info!("All workers started");

        Ok(())
    }

    pub async fn stop(&self) {
        if !self.is_leader() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        self.leader.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
