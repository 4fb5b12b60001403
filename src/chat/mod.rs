pub mod transcript;
pub mod widget;

pub use transcript::{ConversationTurn, ImageReference, Role, Transcript};
pub use widget::{ChatWidget, MediaFactory, GREETING};
