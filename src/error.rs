use thiserror::Error;

use crate::session::Phase;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

/// Rejections surfaced to the chat. The `Display` text is what the user sees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuizError {
    #[error("A quiz is already running in this chat. Use /stop to end it first.")]
    SessionConflict,
    #[error("No quiz is running in this chat.")]
    NoActiveSession,
    #[error("This quiz has no questions yet.")]
    EmptyQuiz,
    #[error("Can't {action} while the quiz is {from}.")]
    InvalidStateTransition { from: Phase, action: &'static str },
    #[error("That poll is no longer current.")]
    StaleAnswer,
    #[error("Question time must be between 5 and 600 seconds, got {0}.")]
    InvalidSpeed(u16),
    #[error("Quiz '{0}' not found.")]
    QuizNotFound(String),
    #[error("Only the quiz creator can do that.")]
    NotCreator,
}

impl QuizError {
    /// Stale answers are dropped quietly; everything else is reported.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, QuizError::StaleAnswer)
    }
}
