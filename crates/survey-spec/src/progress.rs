use serde::Serialize;

use crate::answers::AnswerSet;
use crate::spec::SurveyDefinition;
use crate::visibility::VisibilityMap;

/// Percentage through the visible sections, counting the current one as reached.
pub fn section_progress(current_index: usize, total_visible_sections: usize) -> f64 {
    if total_visible_sections == 0 {
        return 0.0;
    }
    let position = (current_index + 1).min(total_visible_sections);
    position as f64 / total_visible_sections as f64 * 100.0
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub percent: f64,
    pub section: usize,
    pub sections: usize,
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    pub fn compute(
        definition: &SurveyDefinition,
        answers: &AnswerSet,
        visibility: &VisibilityMap,
        current_index: usize,
        visible_sections: usize,
    ) -> Self {
        let (answered, total) = answered_counts(definition, answers, visibility);
        Self {
            percent: section_progress(current_index, visible_sections),
            section: (current_index + 1).min(visible_sections),
            sections: visible_sections,
            answered,
            total,
        }
    }
}

/// Counts answered and total visible questions.
pub fn answered_counts(
    definition: &SurveyDefinition,
    answers: &AnswerSet,
    visibility: &VisibilityMap,
) -> (usize, usize) {
    definition
        .questions()
        .filter(|question| visibility.get(&question.id).copied().unwrap_or(true))
        .fold((0, 0), |(answered, total), question| {
            let filled = answers
                .get(&question.id)
                .is_some_and(|answer| !answer.is_empty());
            (answered + usize::from(filled), total + 1)
        })
}
