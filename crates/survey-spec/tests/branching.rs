use proptest::prelude::*;
use serde_json::json;

use survey_spec::{
    AnswerSet, AnswerValue, SurveyDefinition, apply_conditional_logic, is_visible,
    purge_hidden_answers, validate_all, visible_questions, visible_sections,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "branching" => include_str!("fixtures/branching.json"),
        "financing_survey" => include_str!("fixtures/financing_survey.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn load(name: &str) -> SurveyDefinition {
    serde_json::from_str(fixture(name)).expect("deserialize")
}

/// Records an answer the way a form session does: logic first, then purge.
fn answer(definition: &SurveyDefinition, answers: &AnswerSet, id: &str, value: AnswerValue) -> AnswerSet {
    let mut updated = answers.clone();
    updated.insert(id, value.clone());
    let mut updated = apply_conditional_logic(definition, id, &value, &updated);
    purge_hidden_answers(definition, &mut updated);
    updated
}

#[test]
fn fixtures_pass_lint() {
    assert_eq!(load("branching").lint(), Ok(()));
    assert_eq!(load("financing_survey").lint(), Ok(()));
}

#[test]
fn yes_reveals_second_section() {
    let definition = load("branching");
    let answers = answer(&definition, &AnswerSet::new("branching"), "q1", "yes".into());
    assert_eq!(visible_sections(&definition, &answers).len(), 2);
}

#[test]
fn no_hides_second_section_and_drops_stale_answer() {
    let definition = load("branching");
    let answers = answer(&definition, &AnswerSet::new("branching"), "q1", "yes".into());
    let answers = answer(&definition, &answers, "q2", "equipment".into());
    assert!(answers.contains("q2"));

    let answers = answer(&definition, &answers, "q1", "no".into());
    assert_eq!(visible_sections(&definition, &answers).len(), 1);
    assert!(!answers.contains("q2"));
    let errors = validate_all(&definition, &answers);
    assert!(!errors.contains_key("q2"));
    assert!(errors.is_empty());
}

#[test]
fn all_other_questions_clears_every_other_section() {
    let definition = load("financing_survey");
    let mut answers = AnswerSet::new("financing-needs");
    for (id, value) in [
        ("company_name", AnswerValue::from("Acme")),
        ("contact_email", AnswerValue::from("cfo@acme.fi")),
        ("industry", AnswerValue::from("retail")),
    ] {
        answers = answer(&definition, &answers, id, value);
    }
    answers = answer(&definition, &answers, "needs_financing", "yes".into());
    answers = answer(&definition, &answers, "amount", AnswerValue::from(50000));
    answers = answer(&definition, &answers, "satisfaction", AnswerValue::from(4));

    answers = answer(&definition, &answers, "needs_financing", "no".into());
    assert_eq!(
        answers.question_ids().collect::<Vec<_>>(),
        vec!["needs_financing"]
    );
    assert_eq!(visible_sections(&definition, &answers).len(), 2);
}

#[test]
fn invisible_required_question_has_no_error() {
    let definition = load("financing_survey");
    let mut answers = AnswerSet::new("financing-needs");
    answers.insert("needs_financing", AnswerValue::from("no"));
    let errors = validate_all(&definition, &answers);
    assert!(!errors.contains_key("amount"));
    assert!(errors.contains_key("company_name"));
}

#[test]
fn conditional_logic_is_idempotent_on_fixture() {
    let definition = load("branching");
    let mut answers = AnswerSet::new("branching");
    answers.insert("q1", AnswerValue::from("no"));
    answers.insert("q2", AnswerValue::from("stale"));
    let value = AnswerValue::from("no");
    let once = apply_conditional_logic(&definition, "q1", &value, &answers);
    let twice = apply_conditional_logic(&definition, "q1", &value, &once);
    assert_eq!(once, twice);
}

fn value_strategy() -> impl Strategy<Value = Option<AnswerValue>> {
    prop_oneof![
        Just(None),
        Just(Some(AnswerValue::from("yes"))),
        Just(Some(AnswerValue::from("no"))),
        Just(Some(AnswerValue::from(50000))),
        Just(Some(AnswerValue::from(vec!["equipment"]))),
    ]
}

proptest! {
    #[test]
    fn visible_questions_are_a_filtered_subset(
        needs in value_strategy(),
        industry in value_strategy(),
        amount in value_strategy(),
    ) {
        let definition = load("financing_survey");
        let mut answers = AnswerSet::new("financing-needs");
        for (id, value) in [("needs_financing", needs), ("industry", industry), ("amount", amount)] {
            if let Some(value) = value {
                answers.insert(id, value);
            }
        }
        for section in &definition.sections {
            let visible = visible_questions(section, &answers);
            prop_assert!(visible.len() <= section.questions.len());
            for question in visible {
                prop_assert!(section.questions.iter().any(|candidate| candidate.id == question.id));
                prop_assert!(is_visible(question, &answers));
            }
        }
    }

    #[test]
    fn hidden_questions_never_keep_answers(needs in value_strategy(), amount in 1000i64..100000) {
        let definition = load("financing_survey");
        let mut answers = answer(&definition, &AnswerSet::new("financing-needs"), "needs_financing", "yes".into());
        answers = answer(&definition, &answers, "amount", AnswerValue::from(amount));
        if let Some(value) = needs {
            answers = answer(&definition, &answers, "needs_financing", value);
        }
        let amount_visible = answers
            .get("needs_financing")
            .is_some_and(|value| value.matches(&json!("yes")));
        prop_assert_eq!(answers.contains("amount"), amount_visible);
    }
}
