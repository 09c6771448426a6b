//! In-memory job registry.
//!
//! Records are stored as `Arc<Job>` and replaced whole on every change, so a
//! reader holding a snapshot never sees a half-applied transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use optiscam_models::{Job, JobId, JobStatus, TransitionError};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const EVENT_CAPACITY: usize = 256;

/// Status change published after a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Outcome of [`JobRegistry::update`].
#[derive(Debug, PartialEq)]
pub enum UpdateError {
    NotFound,
    Rejected(TransitionError),
}

/// Process-scoped job store shared by the API and the job manager.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Store a new record and return its snapshot.
    pub async fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        self.jobs.write().await.insert(job.id.clone(), Arc::clone(&job));
        self.publish(&job);
        job
    }

    /// Current snapshot.
    pub async fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Apply a transition to the stored record.
    ///
    /// The closure receives a copy; the stored record is swapped only when it
    /// returns `Ok`, so a rejected transition leaves the record untouched.
    pub async fn update<F>(&self, id: &JobId, transition: F) -> Result<Arc<Job>, UpdateError>
    where
        F: FnOnce(Job) -> Result<Job, TransitionError>,
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get(id).ok_or(UpdateError::NotFound)?;
        let next = Arc::new(transition(Job::clone(current)).map_err(UpdateError::Rejected)?);
        jobs.insert(id.clone(), Arc::clone(&next));
        drop(jobs);

        self.publish(&next);
        Ok(next)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Number of jobs not yet Done or Error.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| !j.is_terminal())
            .count()
    }

    /// Drop Done and Error records that finished more than `retention` ago.
    /// Returns the number removed. Running jobs are never evicted.
    pub async fn evict_finished(&self, retention: Duration) -> usize {
        // Retentions beyond chrono's range keep everything
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return 0;
        };

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.is_terminal() && job.completed_at.is_some_and(|done| done <= cutoff))
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, remaining = jobs.len(), "Evicted finished jobs");
        }
        evicted
    }

    /// Stream of status changes, starting from now.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn publish(&self, job: &Job) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent {
            job_id: job.id.clone(),
            status: job.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiscam_models::{AnalysisOptions, JobSource};

    fn remote_job() -> Job {
        Job::new(
            JobSource::Remote {
                url: "https://youtu.be/abc".into(),
            },
            AnalysisOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = JobRegistry::new();
        let job = registry.insert(remote_job()).await;

        let snapshot = registry.get(&job.id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert!(registry.get(&JobId::new()).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_swaps_whole_record() {
        let registry = JobRegistry::new();
        let job = registry.insert(remote_job()).await;
        let before = registry.get(&job.id).await.unwrap();

        registry.update(&job.id, Job::start_download).await.unwrap();

        // Old snapshot is unaffected.
        assert_eq!(before.status, JobStatus::Pending);
        assert_eq!(
            registry.get(&job.id).await.unwrap().status,
            JobStatus::Downloading
        );
    }

    #[tokio::test]
    async fn test_rejected_transition_leaves_record() {
        let registry = JobRegistry::new();
        let job = registry.insert(remote_job()).await;
        registry.update(&job.id, |j| j.fail("boom")).await.unwrap();

        let err = registry.update(&job.id, Job::start).await.unwrap_err();
        assert!(matches!(err, UpdateError::Rejected(_)));

        let snapshot = registry.get(&job.id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(snapshot.error_message.as_deref(), Some("boom"));
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let registry = JobRegistry::new();
        let err = registry.update(&JobId::new(), Job::start).await.unwrap_err();
        assert_eq!(err, UpdateError::NotFound);
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let registry = JobRegistry::new();
        let mut events = registry.subscribe();
        let job = registry.insert(remote_job()).await;
        registry.update(&job.id, Job::start_download).await.unwrap();

        assert_eq!(events.recv().await.unwrap().status, JobStatus::Pending);
        assert_eq!(events.recv().await.unwrap().status, JobStatus::Downloading);
    }

    #[tokio::test]
    async fn test_evict_finished_keeps_active_and_recent() {
        let registry = JobRegistry::new();
        let active = registry.insert(remote_job()).await;
        let finished = registry.insert(remote_job()).await;
        registry.update(&finished.id, |j| j.fail("boom")).await.unwrap();

        assert_eq!(registry.evict_finished(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.len().await, 2);

        assert_eq!(registry.evict_finished(Duration::ZERO).await, 1);
        assert!(registry.get(&finished.id).await.is_none());
        assert!(registry.get(&active.id).await.is_some());
    }
}
