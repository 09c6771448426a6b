//! Speech transcription.
//!
//! Audio is optional evidence: any failure here degrades the job instead of
//! failing it. Cancellation is the exception and stops the job.

use std::path::Path;
use std::sync::Arc;

use optiscam_media::{MediaBackend, MediaError};
use optiscam_ml_client::SpeechRecognizer;
use optiscam_models::Transcript;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::WorkerError;
use crate::stage::StageOutcome;

/// Name of the extracted track inside the job's frame directory.
pub const AUDIO_ARTIFACT: &str = "audio.wav";

pub struct AudioSignalExtractor {
    backend: Arc<dyn MediaBackend>,
    speech: Arc<dyn SpeechRecognizer>,
    language: Option<String>,
}

impl AudioSignalExtractor {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        speech: Arc<dyn SpeechRecognizer>,
        language: Option<String>,
    ) -> Self {
        Self {
            backend,
            speech,
            language,
        }
    }

    pub async fn extract(
        &self,
        video: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> StageOutcome<Option<Transcript>> {
        let audio_path = work_dir.join(AUDIO_ARTIFACT);

        match self.backend.extract_audio(video, &audio_path, cancel.signal()).await {
            Ok(()) => {}
            Err(MediaError::Cancelled) => return StageOutcome::Fatal(WorkerError::Cancelled),
            Err(MediaError::NoAudio(_)) => {
                return degraded("video has no audio track".to_string());
            }
            Err(e) => return degraded(format!("audio extraction failed: {}", e)),
        }

        match self
            .speech
            .transcribe(&audio_path, self.language.as_deref())
            .await
        {
            Ok(transcript) => {
                debug!(
                    segments = transcript.segments.len(),
                    language = ?transcript.language,
                    "Transcription complete"
                );
                StageOutcome::Success(Some(transcript))
            }
            Err(e) => degraded(format!("transcription failed: {}", e)),
        }
    }
}

fn degraded(warning: String) -> StageOutcome<Option<Transcript>> {
    StageOutcome::Degraded {
        value: None,
        warnings: vec![warning],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::cancel::cancel_pair;
    use optiscam_media::{is_cancelled, CancelSignal, DecodeHints, FrameSource, MediaResult};
    use optiscam_ml_client::{MlError, MlResult};
    use optiscam_models::AudioSegment;
    use std::path::PathBuf;

    struct Backend {
        has_audio: bool,
    }

    #[async_trait]
    impl MediaBackend for Backend {
        async fn open_frames(&self, _video: &Path, _hints: DecodeHints) -> MediaResult<Box<dyn FrameSource>> {
            Err(MediaError::internal("unused"))
        }

        async fn extract_audio(&self, video: &Path, _output: &Path, cancel: CancelSignal) -> MediaResult<()> {
            if is_cancelled(&cancel) {
                Err(MediaError::Cancelled)
            } else if self.has_audio {
                Ok(())
            } else {
                Err(MediaError::NoAudio(video.to_path_buf()))
            }
        }
    }

    struct Speech {
        fail: bool,
    }

    #[async_trait]
    impl SpeechRecognizer for Speech {
        async fn transcribe(&self, audio: &Path, language: Option<&str>) -> MlResult<Transcript> {
            assert!(audio.ends_with(AUDIO_ARTIFACT));
            if self.fail {
                return Err(MlError::ServiceUnavailable("asr down".into()));
            }
            Ok(Transcript::new(
                "send bitcoin now",
                language.map(str::to_string),
                vec![AudioSegment::new(0.0, 3.0, "send bitcoin now")],
            ))
        }
    }

    fn extractor(has_audio: bool, fail: bool) -> AudioSignalExtractor {
        AudioSignalExtractor::new(
            Arc::new(Backend { has_audio }),
            Arc::new(Speech { fail }),
            Some("en".into()),
        )
    }

    #[tokio::test]
    async fn test_transcribes_audio() {
        let outcome = extractor(true, false)
            .extract(&PathBuf::from("v.mp4"), &PathBuf::from("/tmp/job"), &CancelToken::never())
            .await;
        let StageOutcome::Success(Some(t)) = outcome else {
            panic!("expected transcript");
        };
        assert_eq!(t.language.as_deref(), Some("en"));
        assert_eq!(t.segments.len(), 1);
    }

    #[tokio::test]
    async fn test_silent_video_degrades() {
        let outcome = extractor(false, false)
            .extract(&PathBuf::from("v.mp4"), &PathBuf::from("/tmp/job"), &CancelToken::never())
            .await;
        assert!(matches!(
            outcome,
            StageOutcome::Degraded { value: None, ref warnings } if warnings[0].contains("no audio")
        ));
    }

    #[tokio::test]
    async fn test_recognizer_failure_is_never_fatal() {
        let outcome = extractor(true, true)
            .extract(&PathBuf::from("v.mp4"), &PathBuf::from("/tmp/job"), &CancelToken::never())
            .await;
        assert!(!outcome.is_fatal());
        assert!(matches!(outcome, StageOutcome::Degraded { value: None, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_extraction_is_fatal() {
        let (handle, token) = cancel_pair();
        handle.cancel();

        let outcome = extractor(true, false)
            .extract(&PathBuf::from("v.mp4"), &PathBuf::from("/tmp/job"), &token)
            .await;
        assert!(matches!(outcome, StageOutcome::Fatal(WorkerError::Cancelled)));
    }
}
