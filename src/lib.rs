pub mod chat;
pub mod config;
pub mod error;
pub mod flows;
pub mod media;
pub mod scan;
pub mod storage;

#[cfg(test)]
mod testing;

pub use chat::{ChatWidget, Transcript};
pub use config::Configuration;
pub use error::{AppError, FlowError, MediaError, ScanError};

pub use scan::{AnalysisResult, CapturedImage, ScanOrchestrator, ScanSession};
