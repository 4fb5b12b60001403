pub mod classifier;
pub mod image;
pub mod orchestrator;
pub mod outcome;
pub mod render;
pub mod session;

pub use self::image::{CapturedImage, ImageOrigin};
pub use orchestrator::{FallbackPolicy, ScanOrchestrator, ScanOrchestratorBuilder};
pub use outcome::{AnalysisKind, AnalysisResult, ClassifierPayload, ClassifierSlot};
pub use render::{render_result, RenderedResult};
pub use session::{ScanSession, ScanSessionState};
