use crate::scan::outcome::ClassifierSlot;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Scan Error: {0}")]
    Scan(#[from] ScanError),
    #[error("Assistant Error: {0}")]
    Flow(#[from] FlowError),
    #[error("Media Error: {0}")]
    Media(#[from] MediaError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a scan submission can report back to the chat widget.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Analysis unavailable after {} failed attempt(s), please try again", attempts.len())]
    AnalysisUnavailable { attempts: Vec<FailedAttempt> },
    #[error("Cannot {action} while the scan session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("Media source failed: {0}")]
    Media(#[from] MediaError),
}

/// Why a single classifier call did not produce a payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("classifier responded with status {0}")]
    Status(u16),
    #[error("unparsable classifier response: {0}")]
    Parse(String),
    #[error("classifier did not respond within {0:?}")]
    Timeout(Duration),
}

impl ClassifierFailure {
    /// Transport-level failures never produced an HTTP response at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Parallel,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub slot: ClassifierSlot,
    pub phase: AttemptPhase,
    pub failure: ClassifierFailure,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}: {}", self.slot, self.phase, self.failure)
    }
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("Camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("No frame available from the media source")]
    NoFrame,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode frame: {0}")]
    Encode(String),
    #[error("Failed to read media: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("No API key configured for the generative AI endpoint")]
    MissingApiKey,
    #[error("Request to the generative AI endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Generative AI endpoint responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed generative AI response: {0}")]
    MalformedResponse(String),
    #[error("Could not encode flow input: {0}")]
    Encode(#[from] serde_json::Error),
}
