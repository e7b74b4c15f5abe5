#![allow(missing_docs)]

pub mod answers;
pub mod logic;
pub mod progress;
pub mod render;
pub mod spec;
pub mod template;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerSet, AnswerValue, ErrorCode, ErrorMap, ValidationError};
pub use logic::{apply_conditional_logic, apply_conditional_logic_in_place};
pub use progress::{Progress, answered_counts, section_progress};
pub use render::{
    RenderCustomInput, RenderPayload, RenderQuestion, RenderStatus, build_render_payload,
    render_json_ui, render_text,
};
pub use spec::{
    ChoiceOption, ConditionalEffect, Constraint, CustomInput, DefinitionError, HideTarget,
    Question, QuestionType, ScaleSpec, Section, ShowWhen, SurveyDefinition, SurveySettings,
};
pub use template::{TemplateEngine, TemplateError};
pub use validate::{
    ValidationReport, validate_all, validate_answers, validate_question, validate_section,
};
pub use visibility::{
    Conditional, VisibilityMap, is_visible, purge_hidden_answers, resolve_visibility,
    visible_questions, visible_section_indices, visible_sections,
};
