use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerSet, AnswerValue, ErrorCode, ErrorMap, ValidationError};
use crate::spec::{Constraint, Question, QuestionType, Section, SurveyDefinition};
use crate::visibility::{is_visible, visible_questions};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Validates the visible questions of one section.
pub fn validate_section(section: &Section, answers: &AnswerSet) -> ErrorMap {
    let mut errors = ErrorMap::new();
    for question in visible_questions(section, answers) {
        if let Some(error) = validate_question(question, answers.get(&question.id)) {
            errors.insert(question.id.clone(), error);
        }
    }
    errors
}

/// Validates every visible question of every visible section.
pub fn validate_all(definition: &SurveyDefinition, answers: &AnswerSet) -> ErrorMap {
    definition
        .sections
        .iter()
        .filter(|section| is_visible(*section, answers))
        .flat_map(|section| validate_section(section, answers))
        .collect()
}

/// Checks a single answer; `None` and empty answers only fail when the question is required.
pub fn validate_question(question: &Question, answer: Option<&AnswerValue>) -> Option<ValidationError> {
    let answer = match answer {
        Some(answer) if !answer.is_empty() => answer,
        _ if question.required => {
            return Some(error(
                question,
                ErrorCode::RequiredFieldMissing,
                "this question is required",
            ));
        }
        _ => return None,
    };

    match question.kind {
        QuestionType::Radio => validate_single_choice(question, answer),
        QuestionType::Checkbox => validate_multi_choice(question, answer),
        QuestionType::Scale => validate_scale(question, answer),
        QuestionType::Number => validate_number(question, answer),
        QuestionType::Text | QuestionType::Textarea => validate_text(question, answer),
        QuestionType::Email => validate_email(question, answer),
    }
}

fn validate_single_choice(question: &Question, answer: &AnswerValue) -> Option<ValidationError> {
    let Some(selected) = answer.as_str() else {
        return Some(type_mismatch(question));
    };
    if question.has_option(selected) {
        None
    } else {
        Some(error(question, ErrorCode::InvalidOption, "invalid option"))
    }
}

fn validate_multi_choice(question: &Question, answer: &AnswerValue) -> Option<ValidationError> {
    let Some(selected) = answer.selected() else {
        return Some(type_mismatch(question));
    };
    if selected.iter().all(|value| question.has_option(value)) {
        None
    } else {
        Some(error(question, ErrorCode::InvalidOption, "invalid option"))
    }
}

fn validate_scale(question: &Question, answer: &AnswerValue) -> Option<ValidationError> {
    let Some(value) = answer.as_f64() else {
        return Some(type_mismatch(question));
    };
    if let Some(scale) = &question.scale
        && (value < scale.min as f64 || value > scale.max as f64 || value.fract() != 0.0)
    {
        return Some(error(
            question,
            ErrorCode::OutOfRange,
            "rating outside of the scale",
        ));
    }
    None
}

fn validate_number(question: &Question, answer: &AnswerValue) -> Option<ValidationError> {
    let Some(value) = answer.as_f64() else {
        return Some(type_mismatch(question));
    };
    let constraint = question.constraint.as_ref()?;
    if let Some(min) = constraint.min
        && value < min
    {
        return Some(error(question, ErrorCode::OutOfRange, "value below minimum"));
    }
    if let Some(max) = constraint.max
        && value > max
    {
        return Some(error(question, ErrorCode::OutOfRange, "value above maximum"));
    }
    None
}

fn validate_text(question: &Question, answer: &AnswerValue) -> Option<ValidationError> {
    let AnswerValue::Text(text) = answer else {
        return Some(type_mismatch(question));
    };
    question
        .constraint
        .as_ref()
        .and_then(|constraint| enforce_text_constraint(question, text, constraint))
}

fn validate_email(question: &Question, answer: &AnswerValue) -> Option<ValidationError> {
    let AnswerValue::Text(text) = answer else {
        return Some(type_mismatch(question));
    };
    if !EMAIL.is_match(text.trim()) {
        return Some(error(
            question,
            ErrorCode::InvalidEmail,
            "not a valid email address",
        ));
    }
    question
        .constraint
        .as_ref()
        .and_then(|constraint| enforce_text_constraint(question, text, constraint))
}

fn enforce_text_constraint(
    question: &Question,
    text: &str,
    constraint: &Constraint,
) -> Option<ValidationError> {
    if let Some(pattern) = &constraint.pattern
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return Some(error(
            question,
            ErrorCode::PatternMismatch,
            "value does not match pattern",
        ));
    }

    let length = text.chars().count();
    if let Some(min_len) = constraint.min_length
        && length < min_len
    {
        return Some(error(
            question,
            ErrorCode::MinLength,
            "text shorter than min length",
        ));
    }

    if let Some(max_len) = constraint.max_length
        && length > max_len
    {
        return Some(error(
            question,
            ErrorCode::MaxLength,
            "text longer than max length",
        ));
    }

    None
}

fn type_mismatch(question: &Question) -> ValidationError {
    error(
        question,
        ErrorCode::TypeMismatch,
        &format!("expected a {} answer", question.kind),
    )
}

fn error(question: &Question, code: ErrorCode, message: &str) -> ValidationError {
    ValidationError {
        question_id: question.id.clone(),
        code,
        message: message.into(),
    }
}

/// Summary returned by [`validate_answers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

/// Offline validation of a stored response: visible-question errors plus answers for
/// ids the definition does not declare.
pub fn validate_answers(definition: &SurveyDefinition, answers: &AnswerSet) -> ValidationReport {
    let errors = validate_all(definition, answers)
        .into_values()
        .collect::<Vec<_>>();

    let known: BTreeSet<&str> = definition
        .questions()
        .map(|question| question.id.as_str())
        .collect();
    let unknown_fields = answers
        .question_ids()
        .filter(|id| !known.contains(id))
        .map(String::from)
        .collect::<Vec<_>>();

    ValidationReport {
        valid: errors.is_empty() && unknown_fields.is_empty(),
        errors,
        unknown_fields,
    }
}
