use std::sync::atomic::{AtomicUsize, Ordering};

use mediasoup::worker::{Worker, WorkerSettings};
use mediasoup::worker_manager::WorkerManager;
use relaymesh_config::SfuSettings;
use tracing::{error, info};

/// Pool of mediasoup workers with round-robin selection (spec.md §4.3: one
/// worker per CPU core, routers distributed round-robin across them). A
/// worker death is unrecoverable for every room pinned to it — spec.md §4.3
/// treats it as fatal rather than something the adapter retries around.
pub struct WorkerPool {
    workers: Vec<Worker>,
    next: AtomicUsize,
}

impl WorkerPool {
    pub async fn new(settings: &SfuSettings) -> anyhow::Result<Self> {
        let worker_manager = WorkerManager::new();
        let mut workers = Vec::with_capacity(settings.num_workers as usize);

        for i in 0..settings.num_workers {
            let mut worker_settings = WorkerSettings::default();
            worker_settings.rtc_port_range = settings.rtc_min_port..=settings.rtc_max_port;

            let worker = worker_manager
                .create_worker(worker_settings)
                .await
                .map_err(|e| anyhow::anyhow!("failed to create mediasoup worker {i}: {e}"))?;

            let worker_id = worker.id();
            worker
                .on_dead(move |reason| {
                    error!(?reason, %worker_id, "mediasoup worker died, exiting process");
                    std::process::exit(1);
                })
                .detach();

            info!(worker_id = %worker.id(), index = i, "mediasoup worker created");
            workers.push(worker);
        }

        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
        })
    }

    pub fn get_worker(&self) -> &Worker {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[idx]
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
