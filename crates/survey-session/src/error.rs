use survey_spec::DefinitionError;
use thiserror::Error;

use crate::handler::HandlerError;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(
        "survey definition is invalid: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    InvalidDefinition(Vec<DefinitionError>),
    #[error("question '{question}' is not part of survey '{survey}'")]
    UnknownQuestion { survey: String, question: String },
    #[error("the form has already been submitted")]
    AlreadySubmitted,
    #[error("submit is only available on the last visible section")]
    NotOnLastSection,
    #[error("saving drafts is not available for this form")]
    DraftUnavailable,
    #[error("autosave requires a running tokio runtime")]
    NoRuntime,
    #[error("submit handler failed: {0}")]
    Handler(#[source] HandlerError),
}
