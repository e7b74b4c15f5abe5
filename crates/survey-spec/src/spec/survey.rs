use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::question::{HideTarget, Question, ShowWhen};
use crate::spec::section::Section;

/// Behaviour switches stored alongside a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SurveySettings {
    #[serde(default = "default_true")]
    pub show_progress: bool,
    #[serde(default = "default_true")]
    pub save_partial: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            show_progress: true,
            save_partial: true,
        }
    }
}

/// Top-level survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurveyDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub settings: SurveySettings,
}

/// Structural problems found while linting a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("survey has no sections")]
    NoSections,
    #[error("section #{index} has an empty id")]
    EmptySectionId { index: usize },
    #[error("question in section '{section}' has an empty id")]
    EmptyQuestionId { section: String },
    #[error("question id '{0}' is used more than once")]
    DuplicateQuestion(String),
    #[error("{owner} shows when unknown question '{question}' is answered")]
    UnknownShowWhenReference { owner: String, question: String },
    #[error("question '{owner}' hides unknown question '{question}'")]
    UnknownHideReference { owner: String, question: String },
    #[error("choice question '{0}' has no options")]
    MissingOptions(String),
    #[error("scale of question '{0}' has min greater than max")]
    InvalidScale(String),
}

impl SurveyDefinition {
    /// Iterates every question across all sections in declaration order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions().find(|question| question.id == id)
    }

    /// Returns the index of the section that declares `question_id`.
    pub fn section_index_of(&self, question_id: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| section.contains(question_id))
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    /// Checks the definition for dangling references and malformed questions.
    ///
    /// All problems are collected so authors can fix a definition in one pass.
    pub fn lint(&self) -> Result<(), Vec<DefinitionError>> {
        let mut problems = Vec::new();
        if self.sections.is_empty() {
            problems.push(DefinitionError::NoSections);
        }

        let mut ids = BTreeSet::new();
        for (index, section) in self.sections.iter().enumerate() {
            if section.id.trim().is_empty() {
                problems.push(DefinitionError::EmptySectionId { index });
            }
            for question in &section.questions {
                if question.id.trim().is_empty() {
                    problems.push(DefinitionError::EmptyQuestionId {
                        section: section.id.clone(),
                    });
                } else if !ids.insert(question.id.as_str()) {
                    problems.push(DefinitionError::DuplicateQuestion(question.id.clone()));
                }
            }
        }

        for section in &self.sections {
            check_show_when(
                &ids,
                format!("section '{}'", section.id),
                section.show_when.as_ref(),
                &mut problems,
            );
            for question in &section.questions {
                check_question(&ids, question, &mut problems);
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

fn check_show_when(
    ids: &BTreeSet<&str>,
    owner: String,
    show_when: Option<&ShowWhen>,
    problems: &mut Vec<DefinitionError>,
) {
    let Some(show_when) = show_when else {
        return;
    };
    for question in show_when.keys() {
        if !ids.contains(question.as_str()) {
            problems.push(DefinitionError::UnknownShowWhenReference {
                owner: owner.clone(),
                question: question.clone(),
            });
        }
    }
}

fn check_question(ids: &BTreeSet<&str>, question: &Question, problems: &mut Vec<DefinitionError>) {
    check_show_when(
        ids,
        format!("question '{}'", question.id),
        question.show_when.as_ref(),
        problems,
    );

    if question.kind.is_choice() && question.options.is_empty() {
        problems.push(DefinitionError::MissingOptions(question.id.clone()));
    }

    if let Some(scale) = &question.scale
        && scale.min > scale.max
    {
        problems.push(DefinitionError::InvalidScale(question.id.clone()));
    }

    for effect in question.conditional_logic.values() {
        for target in &effect.hide_questions {
            if let HideTarget::Specific(id) = target
                && !ids.contains(id.as_str())
            {
                problems.push(DefinitionError::UnknownHideReference {
                    owner: question.id.clone(),
                    question: id.clone(),
                });
            }
        }
    }
}
