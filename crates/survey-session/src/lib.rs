//! Form sessions over survey definitions.
//!
//! A [`FormController`] owns the answers of one respondent while they move through
//! the visible sections of a survey. Persistence is delegated to two collaborators:
//! a [`SubmitHandler`] for final and draft submissions and an optional
//! [`PartialSaveHandler`] that also drives the periodic autosave.

pub mod autosave;
pub mod controller;
pub mod error;
pub mod handler;

pub use autosave::{AutosaveHandle, DEFAULT_AUTOSAVE_INTERVAL};
pub use controller::{ControllerOptions, FormController, FormState, SubmitOutcome};
pub use error::ControllerError;
pub use handler::{
    CompletionStatus, HandlerError, HandlerResult, PartialSaveHandler, SubmitHandler,
};
