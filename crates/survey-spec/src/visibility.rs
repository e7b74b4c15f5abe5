use std::collections::BTreeMap;

use tracing::debug;

use crate::answers::AnswerSet;
use crate::spec::{Question, Section, ShowWhen, SurveyDefinition};

/// Effective visibility per question id.
pub type VisibilityMap = BTreeMap<String, bool>;

/// Anything that can carry a `showWhen` predicate.
pub trait Conditional {
    fn show_when(&self) -> Option<&ShowWhen>;
}

impl Conditional for Section {
    fn show_when(&self) -> Option<&ShowWhen> {
        self.show_when.as_ref()
    }
}

impl Conditional for Question {
    fn show_when(&self) -> Option<&ShowWhen> {
        self.show_when.as_ref()
    }
}

/// Evaluates a conjunctive equality predicate against the recorded answers.
pub fn is_visible<T: Conditional + ?Sized>(element: &T, answers: &AnswerSet) -> bool {
    let Some(show_when) = element.show_when() else {
        return true;
    };
    show_when.iter().all(|(question_id, expected)| {
        answers
            .get(question_id)
            .is_some_and(|answer| answer.matches(expected))
    })
}

pub fn visible_sections<'a>(
    definition: &'a SurveyDefinition,
    answers: &AnswerSet,
) -> Vec<&'a Section> {
    definition
        .sections
        .iter()
        .filter(|section| is_visible(*section, answers))
        .collect()
}

/// Positions of the visible sections inside `definition.sections`.
pub fn visible_section_indices(definition: &SurveyDefinition, answers: &AnswerSet) -> Vec<usize> {
    definition
        .sections
        .iter()
        .enumerate()
        .filter(|(_, section)| is_visible(*section, answers))
        .map(|(index, _)| index)
        .collect()
}

pub fn visible_questions<'a>(section: &'a Section, answers: &AnswerSet) -> Vec<&'a Question> {
    section
        .questions
        .iter()
        .filter(|question| is_visible(*question, answers))
        .collect()
}

/// Resolves visibility of every question; questions in hidden sections are hidden.
pub fn resolve_visibility(definition: &SurveyDefinition, answers: &AnswerSet) -> VisibilityMap {
    let mut map = VisibilityMap::new();
    for section in &definition.sections {
        let section_visible = is_visible(section, answers);
        for question in &section.questions {
            map.insert(
                question.id.clone(),
                section_visible && is_visible(question, answers),
            );
        }
    }
    map
}

/// Removes answers of questions that are no longer visible.
///
/// Clearing an answer can hide further elements, so this repeats until nothing changes.
/// Answers for ids the definition does not declare are left untouched.
pub fn purge_hidden_answers(definition: &SurveyDefinition, answers: &mut AnswerSet) -> Vec<String> {
    let mut cleared = Vec::new();
    loop {
        let visibility = resolve_visibility(definition, answers);
        let hidden = answers
            .question_ids()
            .filter(|id| visibility.get(*id) == Some(&false))
            .map(String::from)
            .collect::<Vec<_>>();
        if hidden.is_empty() {
            break;
        }
        for id in hidden {
            debug!(question_id = %id, "clearing answer of hidden question");
            answers.remove(&id);
            cleared.push(id);
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use crate::spec::QuestionType;
    use serde_json::json;

    fn chained() -> SurveyDefinition {
        serde_json::from_value(json!({
            "id": "chain",
            "name": "Chain",
            "sections": [
                {
                    "id": "s1",
                    "title": "One",
                    "questions": [
                        { "id": "a", "type": "radio", "text": "A", "options": [
                            { "value": "yes", "label": "Yes" },
                            { "value": "no", "label": "No" }
                        ]},
                        { "id": "b", "type": "radio", "text": "B", "showWhen": { "a": "yes" }, "options": [
                            { "value": "yes", "label": "Yes" }
                        ]},
                        { "id": "c", "type": "text", "text": "C", "showWhen": { "b": "yes" } }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn missing_predicate_is_visible() {
        let question = Question::new("q", QuestionType::Text, "Q");
        assert!(is_visible(&question, &AnswerSet::new("s")));
    }

    #[test]
    fn predicate_requires_every_pair() {
        let mut section = Section::new("s", "S");
        section.show_when = Some(ShowWhen::from([
            ("a".to_string(), json!("yes")),
            ("b".to_string(), json!(3)),
        ]));
        let mut answers = AnswerSet::new("s");
        answers.insert("a", AnswerValue::from("yes"));
        assert!(!is_visible(&section, &answers));
        answers.insert("b", AnswerValue::from(3));
        assert!(is_visible(&section, &answers));
    }

    #[test]
    fn purge_follows_dependency_chain() {
        let definition = chained();
        let mut answers = AnswerSet::new("chain");
        answers.insert("a", AnswerValue::from("yes"));
        answers.insert("b", AnswerValue::from("yes"));
        answers.insert("c", AnswerValue::from("detail"));
        assert!(purge_hidden_answers(&definition, &mut answers).is_empty());

        answers.insert("a", AnswerValue::from("no"));
        let cleared = purge_hidden_answers(&definition, &mut answers);
        assert_eq!(cleared, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(answers.len(), 1);
    }
}
