use crate::scan::image::CapturedImage;
use crate::scan::outcome::AnalysisResult;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Points at the persisted copy of a scanned image and keeps the bytes for
/// display.
#[derive(Debug, Clone)]
pub struct ImageReference {
    pub key: String,
    pub image: CapturedImage,
}

impl ImageReference {
    pub fn new(key: impl Into<String>, image: CapturedImage) -> Self {
        Self {
            key: key.into(),
            image,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub image: Option<ImageReference>,
    pub analysis: Option<AnalysisResult>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn analysis(text: impl Into<String>, image: ImageReference, analysis: AnalysisResult) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            image: Some(image),
            analysis: Some(analysis),
            created_at: Utc::now(),
        }
    }

    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image: None,
            analysis: None,
            created_at: Utc::now(),
        }
    }
}

/// Conversation history in the order it happened.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn latest(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Removes the last turn only if the user wrote it. Used to take back a
    /// question the assistant could not answer.
    pub fn pop_trailing_user(&mut self) -> Option<ConversationTurn> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => self.turns.pop(),
            _ => None,
        }
    }
}
