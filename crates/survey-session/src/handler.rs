use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use survey_spec::AnswerSet;

/// Error type collaborators report back to the controller.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// Completion status passed along with submitted answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    InProgress,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Completed => "completed",
            CompletionStatus::InProgress => "in_progress",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists a response, either final or as a draft.
///
/// Closures `Fn(AnswerSet, CompletionStatus) -> impl Future` implement this trait.
pub trait SubmitHandler: Send + Sync {
    fn submit(&self, answers: AnswerSet, status: CompletionStatus) -> BoxFuture<'_, HandlerResult>;
}

impl<F, Fut> SubmitHandler for F
where
    F: Fn(AnswerSet, CompletionStatus) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn submit(&self, answers: AnswerSet, status: CompletionStatus) -> BoxFuture<'_, HandlerResult> {
        Box::pin(self(answers, status))
    }
}

/// Best-effort background persistence of the current answers.
///
/// Closures `Fn(AnswerSet) -> impl Future` implement this trait.
pub trait PartialSaveHandler: Send + Sync {
    fn save_partial(&self, answers: AnswerSet) -> BoxFuture<'_, HandlerResult>;
}

impl<F, Fut> PartialSaveHandler for F
where
    F: Fn(AnswerSet) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn save_partial(&self, answers: AnswerSet) -> BoxFuture<'_, HandlerResult> {
        Box::pin(self(answers))
    }
}
