use crate::chat::transcript::{ConversationTurn, ImageReference, Transcript};
use crate::error::ScanError;
use crate::media::{MediaSource, StreamHandle};
use crate::scan::image::CapturedImage;
use crate::scan::orchestrator::ScanOrchestrator;
use crate::scan::outcome::AnalysisResult;
use crate::scan::render::render_result;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug)]
pub enum ScanSessionState {
    Idle,
    CameraActive(StreamHandle),
    ImageReady(CapturedImage),
    Analyzing,
}

impl ScanSessionState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanSessionState::Idle => "idle",
            ScanSessionState::CameraActive(_) => "camera active",
            ScanSessionState::ImageReady(_) => "image ready",
            ScanSessionState::Analyzing => "analyzing",
        }
    }
}

/// One capture-and-analyse cycle of the chat widget's scan panel.
///
/// The session owns at most one camera stream or one captured image at a
/// time. Moving to a new state releases whatever the old one held.
pub struct ScanSession {
    id: Uuid,
    state: ScanSessionState,
    media: Box<dyn MediaSource>,
    orchestrator: ScanOrchestrator,
}

impl ScanSession {
    pub fn new(orchestrator: ScanOrchestrator, media: Box<dyn MediaSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ScanSessionState::Idle,
            media,
            orchestrator,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &ScanSessionState {
        &self.state
    }

    pub fn held_image(&self) -> Option<&CapturedImage> {
        match &self.state {
            ScanSessionState::ImageReady(image) => Some(image),
            _ => None,
        }
    }

    pub async fn open_camera(&mut self) -> Result<(), ScanError> {
        if !matches!(
            self.state,
            ScanSessionState::Idle | ScanSessionState::ImageReady(_)
        ) {
            return Err(self.invalid("open the camera"));
        }
        let stream = self.media.open().await?;
        if let ScanSessionState::ImageReady(_) = self.state {
            debug!("Session {} discarding held image for a new capture", self.id);
        }
        self.state = ScanSessionState::CameraActive(stream);
        Ok(())
    }

    pub async fn capture_frame(&mut self) -> Result<(), ScanError> {
        let stream = match &self.state {
            ScanSessionState::CameraActive(stream) => stream.clone(),
            _ => return Err(self.invalid("capture a frame")),
        };
        let image = self.media.capture_frame(&stream).await?;
        self.media.close(stream);
        debug!("Session {} captured {} bytes", self.id, image.len());
        self.state = ScanSessionState::ImageReady(image);
        Ok(())
    }

    pub fn cancel_camera(&mut self) -> Result<(), ScanError> {
        match std::mem::replace(&mut self.state, ScanSessionState::Idle) {
            ScanSessionState::CameraActive(stream) => {
                self.media.close(stream);
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.invalid("cancel the camera"))
            }
        }
    }

    /// Takes an uploaded image, replacing any stream or image already held.
    pub fn choose_file(&mut self, image: CapturedImage) -> Result<(), ScanError> {
        match std::mem::replace(&mut self.state, ScanSessionState::Idle) {
            ScanSessionState::Analyzing => {
                self.state = ScanSessionState::Analyzing;
                return Err(self.invalid("choose a file"));
            }
            ScanSessionState::CameraActive(stream) => self.media.close(stream),
            ScanSessionState::Idle | ScanSessionState::ImageReady(_) => {}
        }
        self.state = ScanSessionState::ImageReady(image);
        Ok(())
    }

    pub async fn choose_file_path(&mut self, path: impl AsRef<Path>) -> Result<(), ScanError> {
        if let ScanSessionState::Analyzing = self.state {
            return Err(self.invalid("choose a file"));
        }
        let image = CapturedImage::from_file(path).await?;
        self.choose_file(image)
    }

    /// Drops the held image and goes back to the camera, or to idle.
    pub async fn retake(&mut self, reopen_camera: bool) -> Result<(), ScanError> {
        if !matches!(self.state, ScanSessionState::ImageReady(_)) {
            return Err(self.invalid("retake"));
        }
        self.state = ScanSessionState::Idle;
        if reopen_camera {
            self.open_camera().await?;
        }
        Ok(())
    }

    /// Submits the held image and commits the result to the transcript.
    ///
    /// On `AnalysisUnavailable` the image stays held so the user can retry
    /// without capturing again.
    #[instrument(skip(self, transcript), fields(session = %self.id))]
    pub async fn submit(&mut self, transcript: &mut Transcript) -> Result<AnalysisResult, ScanError> {
        let image = match &self.state {
            ScanSessionState::ImageReady(image) => image.clone(),
            _ => return Err(self.invalid("submit for analysis")),
        };
        image.validate()?;

        self.state = ScanSessionState::Analyzing;
        let in_flight = InFlight {
            session: self.id,
            state: &mut self.state,
            image: image.clone(),
            settled: false,
        };

        // The analysis runs detached so a dropped submission cannot strand
        // the classifier calls half way; their results are simply discarded.
        let orchestrator = self.orchestrator.clone();
        let task = tokio::spawn(async move { orchestrator.submit_for_analysis(&image).await });
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Analysis task for session {} did not finish: {}", self.id, e);
                Err(ScanError::AnalysisUnavailable {
                    attempts: Vec::new(),
                })
            }
        };

        match outcome {
            Ok(result) => {
                let image = in_flight.commit();
                let turn = ConversationTurn::analysis(
                    render_result(&result).to_string(),
                    ImageReference::new(result.image_key(), image),
                    result.clone(),
                );
                transcript.append(turn);
                info!("Session {} committed a {:?} analysis", self.id, result.kind());
                Ok(result)
            }
            Err(e) => {
                in_flight.fail();
                Err(e)
            }
        }
    }

    fn invalid(&self, action: &'static str) -> ScanError {
        ScanError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let ScanSessionState::CameraActive(stream) =
            std::mem::replace(&mut self.state, ScanSessionState::Idle)
        {
            self.media.close(stream);
        }
    }
}

/// Holds the submitted image while the classifiers run and puts the session
/// back into a valid state however the submission ends.
struct InFlight<'a> {
    session: Uuid,
    state: &'a mut ScanSessionState,
    image: CapturedImage,
    settled: bool,
}

impl InFlight<'_> {
    fn commit(mut self) -> CapturedImage {
        *self.state = ScanSessionState::Idle;
        self.settled = true;
        self.image.clone()
    }

    fn fail(mut self) {
        *self.state = ScanSessionState::ImageReady(self.image.clone());
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                "Submission for session {} abandoned; in-flight classifier calls will finish in the background and be discarded",
                self.session
            );
            *self.state = ScanSessionState::ImageReady(self.image.clone());
        }
    }
}
