use std::sync::Arc;
use std::time::Duration;

use survey_spec::{
    AnswerSet, AnswerValue, ErrorMap, RenderPayload, Section, SurveyDefinition,
    apply_conditional_logic_in_place, build_render_payload, purge_hidden_answers,
    resolve_visibility, section_progress, validate_all, validate_question, validate_section,
    visible_section_indices,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::autosave::{AutosaveHandle, DEFAULT_AUTOSAVE_INTERVAL};
use crate::error::ControllerError;
use crate::handler::{CompletionStatus, PartialSaveHandler, SubmitHandler};

/// Runtime knobs for a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub autosave_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}

/// Lifecycle of a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    InProgress,
    Submitted,
}

/// Result of a submit attempt that reached validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The submit collaborator accepted the answers.
    Submitted,
    /// Validation failed; the controller moved to `position`, the first section with errors.
    Invalid { position: usize, errors: ErrorMap },
}

/// Owns one form session: answers, errors, navigation and autosave.
pub struct FormController {
    definition: Arc<SurveyDefinition>,
    answers: AnswerSet,
    errors: ErrorMap,
    visible: Vec<usize>,
    current: usize,
    state: FormState,
    submitting: watch::Sender<bool>,
    on_submit: Arc<dyn SubmitHandler>,
    on_partial_save: Option<Arc<dyn PartialSaveHandler>>,
    options: ControllerOptions,
    snapshots: watch::Sender<AnswerSet>,
    autosave: Option<AutosaveHandle>,
}

impl FormController {
    /// Creates a session with empty answers; the definition must pass [`SurveyDefinition::lint`].
    pub fn new(
        definition: SurveyDefinition,
        on_submit: impl SubmitHandler + 'static,
    ) -> Result<Self, ControllerError> {
        definition
            .lint()
            .map_err(ControllerError::InvalidDefinition)?;
        let answers = AnswerSet::new(definition.id.clone());
        let (snapshots, _) = watch::channel(answers.clone());
        let mut controller = Self {
            definition: Arc::new(definition),
            answers,
            errors: ErrorMap::new(),
            visible: Vec::new(),
            current: 0,
            state: FormState::InProgress,
            submitting: watch::channel(false).0,
            on_submit: Arc::new(on_submit),
            on_partial_save: None,
            options: ControllerOptions::default(),
            snapshots,
            autosave: None,
        };
        controller.refresh(None);
        Ok(controller)
    }

    pub fn with_partial_save(mut self, handler: impl PartialSaveHandler + 'static) -> Self {
        self.on_partial_save = Some(Arc::new(handler));
        self
    }

    pub fn with_options(mut self, options: ControllerOptions) -> Self {
        self.options = options;
        self
    }

    /// Continues from a previously persisted partial response.
    ///
    /// Answers to questions that are hidden under the resumed answers are dropped.
    pub fn resume(mut self, answers: AnswerSet) -> Self {
        if answers.survey_id != self.definition.id {
            warn!(
                expected = %self.definition.id,
                found = %answers.survey_id,
                "resumed answers belong to a different survey id"
            );
        }
        self.answers = answers;
        self.answers.survey_id = self.definition.id.clone();
        self.refresh(None);
        debug!(answers = self.answers.len(), "resumed form session");
        self
    }

    pub fn definition(&self) -> &SurveyDefinition {
        &self.definition
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        *self.submitting.borrow()
    }

    /// Follows the `submitting` flag, e.g. to disable a submit control while a request runs.
    pub fn submitting_watch(&self) -> watch::Receiver<bool> {
        self.submitting.subscribe()
    }

    /// Position of the current section among the visible sections.
    pub fn current_position(&self) -> usize {
        self.visible
            .iter()
            .position(|index| *index == self.current)
            .unwrap_or(0)
    }

    pub fn visible_section_count(&self) -> usize {
        self.visible.len()
    }

    pub fn current_section(&self) -> Option<&Section> {
        if self.visible.is_empty() {
            return None;
        }
        self.definition.sections.get(self.current)
    }

    pub fn is_first(&self) -> bool {
        self.current_position() == 0
    }

    pub fn is_last(&self) -> bool {
        !self.visible.is_empty() && self.current_position() + 1 == self.visible.len()
    }

    /// Percentage through the visible sections.
    pub fn progress(&self) -> f64 {
        section_progress(self.current_position(), self.visible.len())
    }

    /// Drafts need `save_partial`, a partial-save collaborator and a non-last section.
    pub fn can_save_draft(&self) -> bool {
        self.state == FormState::InProgress && self.drafts_enabled() && !self.is_last()
    }

    pub fn autosave_enabled(&self) -> bool {
        self.drafts_enabled()
    }

    /// Whether an autosave ticker is running and currently saving.
    pub fn is_autosaving(&self) -> bool {
        self.autosave
            .as_ref()
            .is_some_and(AutosaveHandle::is_saving)
    }

    fn drafts_enabled(&self) -> bool {
        self.definition.settings.save_partial && self.on_partial_save.is_some()
    }

    /// Records an answer, applies its conditional logic and recomputes visibility.
    pub fn set_answer(
        &mut self,
        question_id: &str,
        value: impl Into<AnswerValue>,
    ) -> Result<(), ControllerError> {
        self.ensure_editable(question_id)?;
        let value = value.into();
        debug!(question_id, value = %value, "answer recorded");
        self.answers.insert(question_id, value.clone());
        apply_conditional_logic_in_place(&self.definition, question_id, &value, &mut self.answers);
        self.refresh(Some(question_id));
        Ok(())
    }

    pub fn clear_answer(&mut self, question_id: &str) -> Result<(), ControllerError> {
        self.ensure_editable(question_id)?;
        self.answers.remove(question_id);
        self.refresh(Some(question_id));
        Ok(())
    }

    /// Attaches custom-input text when the current answer selects the trigger option.
    ///
    /// Returns `false` when the question has no custom input or it is not triggered.
    pub fn set_custom_input(
        &mut self,
        question_id: &str,
        text: impl Into<String>,
    ) -> Result<bool, ControllerError> {
        self.ensure_editable(question_id)?;
        let Some(trigger) = self
            .definition
            .question(question_id)
            .and_then(|question| question.custom_input.as_ref())
            .map(|custom| custom.show_when.clone())
        else {
            return Ok(false);
        };
        let Some(current) = self.answers.get(question_id).cloned() else {
            return Ok(false);
        };
        if !current.triggers(&trigger) {
            return Ok(false);
        }
        let text = text.into();
        let updated = if text.is_empty() {
            current.without_custom()
        } else {
            current.with_custom(text)
        };
        self.answers.insert(question_id, updated);
        self.refresh(Some(question_id));
        Ok(true)
    }

    /// Validates the visible questions of the current section and records the errors.
    pub fn validate_current_section(&mut self) -> bool {
        let Some(section) = self.current_section() else {
            return true;
        };
        let section_errors = validate_section(section, &self.answers);
        let ids = section
            .questions
            .iter()
            .map(|question| question.id.clone())
            .collect::<Vec<_>>();
        for id in ids {
            self.errors.remove(&id);
        }
        let valid = section_errors.is_empty();
        self.errors.extend(section_errors);
        valid
    }

    /// Validates every visible section and replaces the recorded errors.
    pub fn validate_all(&mut self) -> bool {
        self.errors = validate_all(&self.definition, &self.answers);
        self.errors.is_empty()
    }

    /// Moves to the next visible section when the current one validates.
    ///
    /// Returns whether the controller moved.
    pub fn next(&mut self) -> bool {
        if self.state == FormState::Submitted || self.is_last() || self.visible.is_empty() {
            return false;
        }
        if !self.validate_current_section() {
            debug!(section = self.current, "next blocked by validation errors");
            return false;
        }
        let position = self.current_position();
        self.current = self.visible[position + 1];
        debug!(section = self.current, "advanced to next section");
        true
    }

    /// Moves to the previous visible section without validating.
    pub fn previous(&mut self) -> bool {
        if self.state == FormState::Submitted || self.is_first() {
            return false;
        }
        let position = self.current_position();
        self.current = self.visible[position - 1];
        debug!(section = self.current, "moved back to previous section");
        true
    }

    /// Validates all visible sections and hands the answers to the submit collaborator.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, ControllerError> {
        self.ensure_in_progress()?;
        if !self.is_last() {
            return Err(ControllerError::NotOnLastSection);
        }

        if !self.validate_all() {
            let position = self
                .visible
                .iter()
                .position(|index| {
                    self.definition.sections[*index]
                        .questions
                        .iter()
                        .any(|question| self.errors.contains_key(&question.id))
                })
                .unwrap_or_else(|| self.current_position());
            self.current = self.visible[position];
            info!(
                errors = self.errors.len(),
                section = self.current,
                "submit blocked by validation errors"
            );
            return Ok(SubmitOutcome::Invalid {
                position,
                errors: self.errors.clone(),
            });
        }

        self.dispatch(CompletionStatus::Completed).await?;
        self.state = FormState::Submitted;
        self.autosave = None;
        info!(survey_id = %self.definition.id, answers = self.answers.len(), "form submitted");
        Ok(SubmitOutcome::Submitted)
    }

    /// Sends the answers as an in-progress response without validating.
    pub async fn save_draft(&mut self) -> Result<(), ControllerError> {
        self.ensure_in_progress()?;
        if !self.can_save_draft() {
            return Err(ControllerError::DraftUnavailable);
        }
        self.dispatch(CompletionStatus::InProgress).await?;
        info!(survey_id = %self.definition.id, "draft saved");
        Ok(())
    }

    async fn dispatch(&self, status: CompletionStatus) -> Result<(), ControllerError> {
        let handler = Arc::clone(&self.on_submit);
        let snapshot = self.answers.clone();
        let result = {
            let _in_flight = InFlight::raise(&self.submitting);
            handler.submit(snapshot, status).await
        };
        result.map_err(|err| {
            error!(%status, error = %err, "submit handler failed");
            ControllerError::Handler(err)
        })
    }

    /// Starts the autosave ticker; returns `false` when autosave is disabled for this form.
    pub fn start_autosave(&mut self) -> Result<bool, ControllerError> {
        self.ensure_in_progress()?;
        let Some(saver) = self
            .on_partial_save
            .as_ref()
            .filter(|_| self.definition.settings.save_partial)
        else {
            debug!("autosave disabled for this form");
            return Ok(false);
        };
        let runtime = Handle::try_current().map_err(|_| ControllerError::NoRuntime)?;
        let handle = AutosaveHandle::spawn(
            &runtime,
            Arc::clone(saver),
            self.snapshots.subscribe(),
            self.options.autosave_interval,
        );
        self.autosave = Some(handle);
        debug!(interval = ?self.options.autosave_interval, "autosave started");
        Ok(true)
    }

    pub fn stop_autosave(&mut self) {
        if self.autosave.take().is_some() {
            debug!("autosave stopped");
        }
    }

    /// Presentation payload for the current section.
    pub fn render(&self) -> Option<RenderPayload> {
        build_render_payload(
            &self.definition,
            &self.answers,
            self.current_position(),
            &self.errors,
            self.on_partial_save.is_some(),
        )
    }

    fn ensure_in_progress(&self) -> Result<(), ControllerError> {
        if self.state == FormState::Submitted {
            return Err(ControllerError::AlreadySubmitted);
        }
        Ok(())
    }

    fn ensure_editable(&self, question_id: &str) -> Result<(), ControllerError> {
        self.ensure_in_progress()?;
        if self.definition.question(question_id).is_none() {
            return Err(ControllerError::UnknownQuestion {
                survey: self.definition.id.clone(),
                question: question_id.to_string(),
            });
        }
        Ok(())
    }

    /// Recomputes derived state after any answer mutation.
    fn refresh(&mut self, changed: Option<&str>) {
        let cleared = purge_hidden_answers(&self.definition, &mut self.answers);
        if !cleared.is_empty() {
            debug!(cleared = ?cleared, "dropped answers of hidden questions");
        }

        let visibility = resolve_visibility(&self.definition, &self.answers);
        self.errors
            .retain(|id, _| visibility.get(id).copied().unwrap_or(false));
        if let Some(id) = changed
            && self.errors.contains_key(id)
            && let Some(question) = self.definition.question(id)
        {
            match validate_question(question, self.answers.get(id)) {
                Some(error) => {
                    self.errors.insert(id.to_string(), error);
                }
                None => {
                    self.errors.remove(id);
                }
            }
        }

        self.visible = visible_section_indices(&self.definition, &self.answers);
        if !self.visible.contains(&self.current) {
            self.current = self
                .visible
                .iter()
                .rev()
                .find(|index| **index < self.current)
                .or_else(|| self.visible.first())
                .copied()
                .unwrap_or(0);
        }

        self.snapshots.send_replace(self.answers.clone());
    }
}

/// Keeps the `submitting` flag raised until dropped.
struct InFlight<'a>(&'a watch::Sender<bool>);

impl<'a> InFlight<'a> {
    fn raise(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}
