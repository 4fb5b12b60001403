use crate::chat::transcript::{ConversationTurn, Transcript};
use crate::error::{FlowError, ScanError};
use crate::flows::{AnalyticsRecord, ConversationalFlow, FarmAssistantInput, TaskRecord};
use crate::media::MediaSource;
use crate::scan::orchestrator::ScanOrchestrator;
use crate::scan::outcome::AnalysisResult;
use crate::scan::session::ScanSession;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const GREETING: &str =
    "Hello! How can I help you with your farm today? Feel free to ask about your tasks or analytics.";

/// Opens a fresh media source each time a scan session starts.
pub type MediaFactory = Box<dyn Fn() -> Box<dyn MediaSource> + Send + Sync>;

pub struct ChatWidget {
    transcript: Transcript,
    scan: Option<ScanSession>,
    assistant: Arc<dyn ConversationalFlow>,
    orchestrator: ScanOrchestrator,
    media: MediaFactory,
    tasks: Vec<TaskRecord>,
    analytics: Vec<AnalyticsRecord>,
}

impl ChatWidget {
    pub fn new(
        assistant: Arc<dyn ConversationalFlow>,
        orchestrator: ScanOrchestrator,
        media: MediaFactory,
    ) -> Self {
        Self {
            transcript: Transcript::new(),
            scan: None,
            assistant,
            orchestrator,
            media,
            tasks: Vec::new(),
            analytics: Vec::new(),
        }
    }

    /// Context handed to the assistant with every question.
    pub fn with_records(mut self, tasks: Vec<TaskRecord>, analytics: Vec<AnalyticsRecord>) -> Self {
        self.tasks = tasks;
        self.analytics = analytics;
        self
    }

    pub fn open(&mut self) {
        if self.transcript.is_empty() {
            self.transcript.append(ConversationTurn::assistant(GREETING));
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn has_scan(&self) -> bool {
        self.scan.is_some()
    }

    /// Asks the assistant and records both sides of the exchange. Blank input
    /// is ignored. If the assistant fails the question is taken back out of
    /// the transcript.
    pub async fn send_message(&mut self, question: &str) -> Result<Option<&ConversationTurn>, FlowError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }

        self.transcript.append(ConversationTurn::user(question));
        let input = FarmAssistantInput {
            question: question.to_string(),
            tasks: self.tasks.clone(),
            analytics_data: self.analytics.clone(),
        };

        match self.assistant.answer(input).await {
            Ok(output) => {
                self.transcript.append(ConversationTurn::assistant(output.answer));
                Ok(self.transcript.latest())
            }
            Err(e) => {
                warn!("Assistant could not answer: {}", e);
                self.transcript.pop_trailing_user();
                Err(e)
            }
        }
    }

    /// The live scan session, started on first use.
    pub fn scan(&mut self) -> &mut ScanSession {
        let orchestrator = &self.orchestrator;
        let media = &self.media;
        self.scan.get_or_insert_with(|| {
            let session = ScanSession::new(orchestrator.clone(), media());
            debug!("Started scan session {}", session.id());
            session
        })
    }

    pub async fn submit_scan(&mut self) -> Result<AnalysisResult, ScanError> {
        let session = self.scan.as_mut().ok_or(ScanError::InvalidTransition {
            action: "submit for analysis",
            state: "idle",
        })?;
        let result = session.submit(&mut self.transcript).await?;
        self.scan = None;
        Ok(result)
    }

    /// Tears the widget down. A submission abandoned earlier keeps running on
    /// its own task and its result is dropped.
    pub fn close(self) {
        info!(
            "Closing chat widget with {} turns; any detached analysis will be discarded",
            self.transcript.len()
        );
    }
}
