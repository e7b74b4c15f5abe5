use tracing::debug;

use crate::answers::{AnswerSet, AnswerValue};
use crate::spec::{HideTarget, SurveyDefinition};

/// Applies the `conditionalLogic` effect registered for `value` and returns the updated answers.
///
/// Unknown questions, values without an effect and multi-select answers leave the
/// answers unchanged.
pub fn apply_conditional_logic(
    definition: &SurveyDefinition,
    question_id: &str,
    value: &AnswerValue,
    answers: &AnswerSet,
) -> AnswerSet {
    let mut updated = answers.clone();
    apply_conditional_logic_in_place(definition, question_id, value, &mut updated);
    updated
}

/// In-place variant of [`apply_conditional_logic`]; returns the ids whose answers were cleared.
pub fn apply_conditional_logic_in_place(
    definition: &SurveyDefinition,
    question_id: &str,
    value: &AnswerValue,
    answers: &mut AnswerSet,
) -> Vec<String> {
    let Some(question) = definition.question(question_id) else {
        return Vec::new();
    };
    let Some(effect) = value.logic_key().and_then(|key| question.effect_for(&key)) else {
        return Vec::new();
    };

    let mut cleared = Vec::new();
    for target in &effect.hide_questions {
        match target {
            HideTarget::Specific(id) => {
                if answers.remove(id).is_some() {
                    cleared.push(id.clone());
                }
            }
            HideTarget::AllOthers => {
                let own_section = definition.section_index_of(question_id);
                for (index, section) in definition.sections.iter().enumerate() {
                    if Some(index) == own_section {
                        continue;
                    }
                    for other in &section.questions {
                        if answers.remove(&other.id).is_some() {
                            cleared.push(other.id.clone());
                        }
                    }
                }
            }
        }
    }

    if !cleared.is_empty() {
        debug!(
            question_id,
            cleared = ?cleared,
            "conditional logic cleared answers"
        );
    }
    cleared
}
