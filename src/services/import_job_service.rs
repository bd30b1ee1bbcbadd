//! Keyed status store for asynchronous PDF extraction jobs.
//!
//! Job state is explicit and passed to whoever needs it instead of living in
//! ambient process globals. Entries are evicted after a TTL so abandoned
//! polling never leaks memory.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use uuid::Uuid;

use crate::models::drug::RawDrugRecord;
use crate::models::pdf_import::{JobStatus, JobStatusResponse};

const JOB_TTL: Duration = Duration::from_secs(3600);
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct JobEntry {
    status: JobStatus,
    progress: u8,
    message: String,
    result: Option<Vec<RawDrugRecord>>,
    error: Option<String>,
    touched_at: Instant,
}

#[derive(Clone)]
pub struct ImportJobStore {
    jobs: Arc<DashMap<Uuid, JobEntry>>,
}

impl ImportJobStore {
    /// Creates the store and spawns its background eviction sweep.
    pub fn new() -> Self {
        let store = Self {
            jobs: Arc::new(DashMap::new()),
        };

        let jobs = store.jobs.clone();
        tokio::spawn(async move {
            loop {
                sleep(SWEEP_INTERVAL).await;

                let now = Instant::now();
                jobs.retain(|job_id, entry| {
                    let keep = now.duration_since(entry.touched_at) < JOB_TTL;
                    if !keep {
                        tracing::debug!("Evicted expired import job: {}", job_id);
                    }
                    keep
                });
            }
        });

        store
    }

    pub fn create(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.insert(
            job_id,
            JobEntry {
                status: JobStatus::Queued,
                progress: 0,
                message: "Queued for processing".to_string(),
                result: None,
                error: None,
                touched_at: Instant::now(),
            },
        );
        job_id
    }

    pub fn set_progress(&self, job_id: Uuid, progress: u8, message: &str) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.status = JobStatus::Processing;
            entry.progress = progress.min(100);
            entry.message = message.to_string();
            entry.touched_at = Instant::now();
        }
    }

    pub fn complete(&self, job_id: Uuid, records: Vec<RawDrugRecord>) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.status = JobStatus::Completed;
            entry.progress = 100;
            entry.message = format!("Extracted {} records", records.len());
            entry.result = Some(records);
            entry.touched_at = Instant::now();
        }
    }

    pub fn fail(&self, job_id: Uuid, error: String) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.status = JobStatus::Failed;
            entry.message = "Extraction failed".to_string();
            entry.error = Some(error);
            entry.touched_at = Instant::now();
        }
    }

    pub fn get(&self, job_id: Uuid) -> Option<JobStatusResponse> {
        self.jobs.get(&job_id).map(|entry| JobStatusResponse {
            job_id,
            status: entry.status,
            progress: entry.progress,
            message: entry.message.clone(),
            result: entry.result.clone(),
            error: entry.error.clone(),
        })
    }

    fn evict_older_than(&self, ttl: Duration) {
        let now = Instant::now();
        self.jobs
            .retain(|_, entry| now.duration_since(entry.touched_at) < ttl);
    }
}

impl Default for ImportJobStore {
    fn default() -> Self {
        Self::new()
    }
}
