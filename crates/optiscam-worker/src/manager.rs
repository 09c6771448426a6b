//! Job lifecycle management.
//!
//! Submission records a Pending job and dispatches a background task; it
//! never waits on the pipeline. The task stages the media, drives the job
//! through its state machine, sweeps every artifact it created, and only
//! then writes the terminal status.
//!
//! On timeout or cancel the running stages are signalled and given a grace
//! period to stop, so the sweep does not race work that is still writing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use optiscam_media::VideoFetcher;
use optiscam_models::{AnalysisOptions, AnalysisResult, Job, JobId, JobSource, JobStatus, TransitionError};
use tokio::sync::{broadcast, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{warn, Instrument};

use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::cleanup::ArtifactGuard;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{AnalysisPipeline, Collaborators, PipelineInput};
use crate::registry::{JobRegistry, UpdateError};

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    NotFound,
    AlreadyTerminal(JobStatus),
    Requested,
}

/// Pause before re-sweeping after abandoned work, for blocking tasks the
/// dropped stage left behind.
const ABANDONED_SETTLE: Duration = Duration::from_secs(1);

/// Media the background task has to stage before the pipeline can start.
enum Staging {
    Upload { filename: String, bytes: Vec<u8> },
    Remote { url: String },
}

/// Owns the job registry and runs one background task per job.
#[derive(Clone)]
pub struct JobManager {
    registry: Arc<JobRegistry>,
    pipeline: Arc<AnalysisPipeline>,
    fetcher: Arc<dyn VideoFetcher>,
    config: Arc<WorkerConfig>,
    permits: Arc<Semaphore>,
    cancels: Arc<Mutex<HashMap<JobId, CancelHandle>>>,
}

impl JobManager {
    pub fn new(collaborators: Collaborators, fetcher: Arc<dyn VideoFetcher>, config: WorkerConfig) -> Self {
        let pipeline = AnalysisPipeline::new(
            collaborators,
            config.pipeline.clone(),
            config.report_dir.clone(),
        );
        Self {
            registry: Arc::new(JobRegistry::new()),
            pipeline: Arc::new(pipeline),
            fetcher,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            config: Arc::new(config),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Accept an uploaded video. The bytes are staged by the job task.
    pub async fn submit_upload(&self, filename: &str, bytes: Vec<u8>, options: AnalysisOptions) -> JobId {
        let source = JobSource::Upload {
            filename: filename.to_string(),
        };
        self.submit(
            source,
            options,
            Staging::Upload {
                filename: filename.to_string(),
                bytes,
            },
        )
        .await
    }

    /// Accept a remote video URL. The job passes through Downloading.
    pub async fn submit_remote(&self, url: &str, options: AnalysisOptions) -> JobId {
        let source = JobSource::Remote { url: url.to_string() };
        self.submit(source, options, Staging::Remote { url: url.to_string() })
            .await
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.registry.get(id).await
    }

    /// Ask a running job to stop. Observed at the next stage boundary.
    pub async fn cancel(&self, id: &JobId) -> CancelOutcome {
        let Some(job) = self.registry.get(id).await else {
            return CancelOutcome::NotFound;
        };
        if job.is_terminal() {
            return CancelOutcome::AlreadyTerminal(job.status);
        }
        self.signal_cancel(id).await;
        CancelOutcome::Requested
    }

    /// Wait until the job reaches Done or Error.
    pub async fn wait_terminal(&self, id: &JobId) -> Option<Arc<Job>> {
        let mut events = self.registry.subscribe();
        loop {
            let job = self.registry.get(id).await?;
            if job.is_terminal() {
                return Some(job);
            }
            loop {
                match events.recv().await {
                    Ok(event) if event.job_id == *id && event.status.is_terminal() => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return self.registry.get(id).await,
                }
            }
        }
    }

    async fn submit(&self, source: JobSource, options: AnalysisOptions, staging: Staging) -> JobId {
        let kind = if source.is_remote() { "remote" } else { "upload" };
        self.registry.evict_finished(self.config.job_retention).await;
        let job = self.registry.insert(Job::new(source, options)).await;
        let job_id = job.id.clone();
        metrics::record_job_created(kind);

        let (handle, token) = cancel_pair();
        self.cancels.lock().await.insert(job_id.clone(), handle);

        let logger = JobLogger::new(&job_id, "analysis");
        logger.log_start(&format!("{} job accepted", kind));

        let manager = self.clone();
        let span = logger.create_span();
        let options = job.options.clone();
        let id = job_id.clone();
        tokio::spawn(
            async move {
                manager.run_job(id, options, staging, token, logger).await;
            }
            .instrument(span),
        );

        job_id
    }

    /// Background task body. Always ends with a terminal status and an
    /// empty artifact prefix.
    async fn run_job(
        &self,
        job_id: JobId,
        options: AnalysisOptions,
        staging: Staging,
        cancel: CancelToken,
        logger: JobLogger,
    ) {
        let mut guard = ArtifactGuard::new(&self.config.work_dir, &job_id);

        let (outcome, abandoned) = match self.acquire_slot(&cancel).await {
            Ok(_permit) => {
                metrics::job_started();
                let _active = scopeguard::guard((), |_| metrics::job_finished());
                self.supervise(&job_id, &options, staging, &cancel, &logger, &guard)
                    .await
            }
            Err(e) => (Err(e), false),
        };

        // Artifacts go before the terminal status becomes visible.
        guard.cleanup().await;
        if abandoned {
            tokio::time::sleep(ABANDONED_SETTLE).await;
            guard.cleanup().await;
        }
        self.cancels.lock().await.remove(&job_id);

        match outcome {
            Ok(result) => {
                let verdict = result.verdict;
                let confidence = result.confidence;
                if self.transition(&job_id, &logger, |j| j.complete(result)).await.is_ok() {
                    metrics::record_job_completed(verdict.as_str());
                    logger.log_completion(&format!(
                        "verdict {} (confidence {})",
                        verdict.label(),
                        confidence.map_or_else(|| "n/a".to_string(), |c| format!("{:.1}%", c))
                    ));
                }
            }
            Err(e) => {
                let message = e.to_string();
                logger.log_error(&message);
                metrics::record_job_failed(e.kind());
                if let Err(te) = self.transition(&job_id, &logger, |j| j.fail(message)).await {
                    warn!(job_id = %job_id, "Could not record job failure: {}", te);
                }
            }
        }
    }

    /// Wait for a pool slot. A job cancelled while queued never starts.
    async fn acquire_slot(&self, cancel: &CancelToken) -> WorkerResult<Option<OwnedSemaphorePermit>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkerError::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => Ok(Some(permit)),
                Err(e) => {
                    warn!("Worker pool closed: {}", e);
                    Ok(None)
                }
            },
        }
    }

    /// Run the job under its deadline.
    ///
    /// When the deadline passes or a cancel arrives, the stages are signalled
    /// and awaited for up to `unwind_grace`. The flag is true when they did
    /// not stop in time and were dropped mid-stage.
    async fn supervise(
        &self,
        job_id: &JobId,
        options: &AnalysisOptions,
        staging: Staging,
        cancel: &CancelToken,
        logger: &JobLogger,
        guard: &ArtifactGuard,
    ) -> (WorkerResult<AnalysisResult>, bool) {
        let work = self.execute(job_id, options, staging, cancel, logger, guard);
        tokio::pin!(work);

        let timeout = self.config.job_timeout;
        let stop = tokio::select! {
            outcome = &mut work => return (outcome, false),
            _ = tokio::time::sleep(timeout) => {
                self.signal_cancel(job_id).await;
                WorkerError::TimedOut(timeout.as_secs())
            }
            _ = cancel.cancelled() => WorkerError::Cancelled,
        };

        let grace = self.config.unwind_grace;
        match tokio::time::timeout(grace, &mut work).await {
            Ok(_) => (Err(stop), false),
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    grace_secs = grace.as_secs_f64(),
                    "Job stages did not stop in time, abandoning them"
                );
                (Err(stop), true)
            }
        }
    }

    async fn signal_cancel(&self, job_id: &JobId) {
        if let Some(handle) = self.cancels.lock().await.get(job_id) {
            handle.cancel();
        }
    }

    /// Stage the media, then run the pipeline.
    async fn execute(
        &self,
        job_id: &JobId,
        options: &AnalysisOptions,
        staging: Staging,
        cancel: &CancelToken,
        logger: &JobLogger,
        guard: &ArtifactGuard,
    ) -> WorkerResult<AnalysisResult> {
        cancel.check()?;
        tokio::fs::create_dir_all(guard.work_dir())
            .await
            .map_err(|e| WorkerError::media_ingest(format!("cannot create work directory: {}", e)))?;

        let (video, source_label): (PathBuf, String) = match staging {
            Staging::Upload { filename, bytes } => {
                let path = guard.upload_path(&filename);
                tokio::fs::write(&path, &bytes)
                    .await
                    .map_err(|e| WorkerError::media_ingest(format!("failed to stage upload: {}", e)))?;
                cancel.check()?;
                self.transition(job_id, logger, Job::start).await?;
                (path, filename)
            }
            Staging::Remote { url } => {
                self.transition(job_id, logger, Job::start_download).await?;
                let path = self
                    .fetcher
                    .fetch(&url, guard.work_dir(), job_id.as_str(), cancel.signal())
                    .await?;
                cancel.check()?;
                self.transition(job_id, logger, Job::start).await?;
                (path, url)
            }
        };

        let scratch = guard.frames_dir();
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| WorkerError::media_ingest(format!("cannot create frame directory: {}", e)))?;

        self.pipeline
            .run(
                PipelineInput {
                    job_id,
                    video: &video,
                    scratch_dir: &scratch,
                    source_label: &source_label,
                    options,
                },
                cancel,
                logger,
            )
            .await
    }

    async fn transition<F>(&self, job_id: &JobId, logger: &JobLogger, f: F) -> WorkerResult<Arc<Job>>
    where
        F: FnOnce(Job) -> Result<Job, TransitionError>,
    {
        let mut from = JobStatus::Pending;
        let result = self
            .registry
            .update(job_id, |job| {
                from = job.status;
                f(job)
            })
            .await;

        match result {
            Ok(job) => {
                logger.log_transition(from, job.status);
                Ok(job)
            }
            Err(UpdateError::Rejected(e)) => Err(e.into()),
            Err(UpdateError::NotFound) => Err(WorkerError::JobNotFound(job_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use optiscam_media::{CancelSignal, DecodeHints, FrameSource, MediaBackend, MediaError, MediaResult};
    use optiscam_ml_client::{
        ClassifierOutput, MlResult, RecognizedLine, SpeechRecognizer, TextRecognizer, VisionLanguageModel,
    };
    use optiscam_models::{BoundingRegion, Transcript};
    use std::path::Path;
    use tempfile::TempDir;

    struct NoVideo;

    #[async_trait]
    impl MediaBackend for NoVideo {
        async fn open_frames(&self, video: &Path, _hints: DecodeHints) -> MediaResult<Box<dyn FrameSource>> {
            Err(MediaError::InvalidVideo(format!("cannot decode {}", video.display())))
        }

        async fn extract_audio(&self, video: &Path, _output: &Path, _cancel: CancelSignal) -> MediaResult<()> {
            Err(MediaError::NoAudio(video.to_path_buf()))
        }
    }

    struct Idle;

    #[async_trait]
    impl TextRecognizer for Idle {
        async fn detect(&self, _image: &Path) -> MlResult<Vec<RecognizedLine>> {
            Ok(vec![])
        }

        async fn refine(&self, _image: &Path, _region: &BoundingRegion) -> MlResult<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl SpeechRecognizer for Idle {
        async fn transcribe(&self, _audio: &Path, _language: Option<&str>) -> MlResult<Transcript> {
            Ok(Transcript::default())
        }
    }

    #[async_trait]
    impl VisionLanguageModel for Idle {
        async fn classify(&self, _images: &[PathBuf], _prompt: &str) -> MlResult<ClassifierOutput> {
            Ok(ClassifierOutput {
                text: "No.".into(),
                first_token_logits: None,
            })
        }

        async fn describe(&self, _image: &Path, _prompt: &str) -> MlResult<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl VideoFetcher for Idle {
        async fn fetch(
            &self,
            _url: &str,
            _staging_dir: &Path,
            _file_stem: &str,
            _cancel: CancelSignal,
        ) -> MediaResult<PathBuf> {
            Err(MediaError::download_failed("unreachable"))
        }
    }

    fn manager(dir: &Path) -> JobManager {
        let idle = Arc::new(Idle);
        JobManager::new(
            Collaborators {
                media: Arc::new(NoVideo),
                text: idle.clone(),
                speech: idle.clone(),
                vlm: idle.clone(),
            },
            idle,
            WorkerConfig {
                work_dir: dir.to_path_buf(),
                ..WorkerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_undecodable_upload_fails_and_is_swept() {
        let dir = TempDir::new().unwrap();
        let manager = manager(dir.path());

        let id = manager
            .submit_upload("clip.mp4", b"not a video".to_vec(), AnalysisOptions::default())
            .await;
        let job = manager.wait_terminal(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error_message.as_deref().unwrap().starts_with("Media ingest failed"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_and_terminal() {
        let dir = TempDir::new().unwrap();
        let manager = manager(dir.path());

        assert_eq!(manager.cancel(&JobId::new()).await, CancelOutcome::NotFound);

        let id = manager.submit_remote("https://youtu.be/x", AnalysisOptions::default()).await;
        let job = manager.wait_terminal(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(
            manager.cancel(&id).await,
            CancelOutcome::AlreadyTerminal(JobStatus::Error)
        );
    }

    #[tokio::test]
    async fn test_wait_terminal_unknown_id() {
        let dir = TempDir::new().unwrap();
        assert!(manager(dir.path()).wait_terminal(&JobId::new()).await.is_none());
    }
}
