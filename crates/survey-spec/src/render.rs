use serde_json::{Map, Value, json};

use crate::{
    answers::{AnswerSet, AnswerValue, ErrorMap, ValidationError},
    progress::Progress,
    spec::{ChoiceOption, QuestionType, ScaleSpec, SurveyDefinition},
    template::TemplateEngine,
    visibility::{is_visible, resolve_visibility, visible_section_indices},
};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Visible required questions of the section are still unanswered.
    NeedInput,
    /// Every visible required question of the section is answered.
    Complete,
    /// The section carries validation errors.
    Error,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Error => "error",
        }
    }
}

/// Auxiliary free-text field shown next to a choice.
#[derive(Debug, Clone)]
pub struct RenderCustomInput {
    pub trigger: String,
    pub placeholder: Option<String>,
    pub active: bool,
    pub value: Option<String>,
}

/// Describes a single question for render outputs.
#[derive(Debug, Clone)]
pub struct RenderQuestion {
    pub id: String,
    pub text: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub kind: QuestionType,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<AnswerValue>,
    pub options: Vec<ChoiceOption>,
    pub scale: Option<ScaleSpec>,
    pub custom_input: Option<RenderCustomInput>,
    pub error: Option<ValidationError>,
}

/// Presentation-neutral view of the current section.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub survey_id: String,
    pub survey_name: String,
    pub section_id: String,
    pub section_title: String,
    pub section_description: Option<String>,
    pub status: RenderStatus,
    pub progress: Option<Progress>,
    pub is_first: bool,
    pub is_last: bool,
    pub can_save_draft: bool,
    pub questions: Vec<RenderQuestion>,
}

impl RenderPayload {
    pub fn visible_questions(&self) -> impl Iterator<Item = &RenderQuestion> {
        self.questions.iter().filter(|question| question.visible)
    }
}

/// Builds the payload for the `position`-th visible section.
///
/// `draft_enabled` tells whether a draft collaborator is configured; drafts are never
/// offered on the last section or when the survey disables partial saves.
pub fn build_render_payload(
    definition: &SurveyDefinition,
    answers: &AnswerSet,
    position: usize,
    errors: &ErrorMap,
    draft_enabled: bool,
) -> Option<RenderPayload> {
    let visible = visible_section_indices(definition, answers);
    let section_index = *visible.get(position)?;
    let section = &definition.sections[section_index];
    let visibility = resolve_visibility(definition, answers);
    let templates = TemplateEngine::shared();

    let questions = section
        .questions
        .iter()
        .map(|question| {
            let current_value = answers.get(&question.id).cloned();
            let custom_input = question.custom_input.as_ref().map(|custom| {
                let active = current_value
                    .as_ref()
                    .is_some_and(|value| value.triggers(&custom.show_when));
                RenderCustomInput {
                    trigger: custom.show_when.clone(),
                    placeholder: custom.placeholder.clone(),
                    active,
                    value: current_value
                        .as_ref()
                        .and_then(AnswerValue::custom_text)
                        .map(String::from),
                }
            });
            RenderQuestion {
                id: question.id.clone(),
                text: templates.render_or_raw(&question.text, answers),
                description: question.description.clone(),
                placeholder: question.placeholder.clone(),
                kind: question.kind,
                required: question.required,
                visible: is_visible(question, answers),
                current_value,
                options: question.options.clone(),
                scale: question.scale.clone(),
                custom_input,
                error: errors.get(&question.id).cloned(),
            }
        })
        .collect::<Vec<_>>();

    let has_errors = questions
        .iter()
        .any(|question| question.visible && question.error.is_some());
    let missing_required = questions.iter().any(|question| {
        question.visible
            && question.required
            && question
                .current_value
                .as_ref()
                .is_none_or(AnswerValue::is_empty)
    });
    let status = if has_errors {
        RenderStatus::Error
    } else if missing_required {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    let is_last = position + 1 == visible.len();
    let progress = definition.settings.show_progress.then(|| {
        Progress::compute(definition, answers, &visibility, position, visible.len())
    });

    Some(RenderPayload {
        survey_id: definition.id.clone(),
        survey_name: definition.name.clone(),
        section_id: section.id.clone(),
        section_title: templates.render_or_raw(&section.title, answers),
        section_description: section.description.clone(),
        status,
        progress,
        is_first: position == 0,
        is_last,
        can_save_draft: draft_enabled && definition.settings.save_partial && !is_last,
        questions,
    })
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let questions = payload
        .questions
        .iter()
        .map(|question| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(question.id.clone()));
            map.insert("text".into(), Value::String(question.text.clone()));
            map.insert(
                "description".into(),
                question
                    .description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            map.insert("type".into(), Value::String(question.kind.to_string()));
            map.insert("required".into(), Value::Bool(question.required));
            map.insert("visible".into(), Value::Bool(question.visible));
            if let Some(placeholder) = &question.placeholder {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            if let Some(current_value) = &question.current_value {
                map.insert(
                    "current_value".into(),
                    serde_json::to_value(current_value).unwrap_or(Value::Null),
                );
            }
            if !question.options.is_empty() {
                map.insert(
                    "options".into(),
                    Value::Array(
                        question
                            .options
                            .iter()
                            .map(|option| json!({ "value": option.value, "label": option.label }))
                            .collect(),
                    ),
                );
            }
            if let Some(scale) = &question.scale {
                map.insert(
                    "scale".into(),
                    json!({
                        "min": scale.min,
                        "max": scale.max,
                        "min_label": scale.min_label,
                        "max_label": scale.max_label,
                    }),
                );
            }
            if let Some(custom) = &question.custom_input {
                map.insert(
                    "custom_input".into(),
                    json!({
                        "show_when": custom.trigger,
                        "placeholder": custom.placeholder,
                        "active": custom.active,
                        "value": custom.value,
                    }),
                );
            }
            if let Some(error) = &question.error {
                map.insert(
                    "error".into(),
                    json!({ "code": error.code.as_str(), "message": error.message }),
                );
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "survey_id": payload.survey_id,
        "survey_name": payload.survey_name,
        "section_id": payload.section_id,
        "section_title": payload.section_title,
        "section_description": payload.section_description,
        "status": payload.status.as_str(),
        "progress": payload.progress,
        "is_first": payload.is_first,
        "is_last": payload.is_last,
        "can_save_draft": payload.can_save_draft,
        "questions": questions,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Survey: {} ({})", payload.survey_name, payload.survey_id));
    if let Some(progress) = &payload.progress {
        lines.push(format!(
            "Section {}/{} ({:.0}%) - {}/{} answered",
            progress.section,
            progress.sections,
            progress.percent,
            progress.answered,
            progress.total
        ));
    }
    lines.push(format!("== {} ==", payload.section_title));
    if let Some(description) = &payload.section_description {
        lines.push(description.clone());
    }
    lines.push(format!("Status: {}", payload.status.as_str()));

    for question in payload.visible_questions() {
        let mut entry = format!(" - {} ({})", question.id, question.text);
        if question.required {
            entry.push_str(" [required]");
        }
        if let Some(current_value) = &question.current_value {
            entry.push_str(&format!(" = {}", current_value));
        }
        lines.push(entry);
        if let Some(error) = &question.error {
            lines.push(format!("   ! {} ({})", error.message, error.code.as_str()));
        }
    }

    let mut actions = Vec::new();
    if !payload.is_first {
        actions.push("back");
    }
    if payload.can_save_draft {
        actions.push("save draft");
    }
    actions.push(if payload.is_last { "submit" } else { "next" });
    lines.push(format!("Actions: {}", actions.join(", ")));

    lines.join("\n")
}
