use serde_json::json;

use survey_spec::{
    AnswerSet, AnswerValue, ErrorMap, SurveyDefinition, build_render_payload,
    render::{RenderStatus, render_json_ui, render_text},
    validate_all,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "financing_survey" => include_str!("fixtures/financing_survey.json"),
        "branching" => include_str!("fixtures/branching.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn survey() -> SurveyDefinition {
    serde_json::from_str(fixture("financing_survey")).expect("deserialize")
}

#[test]
fn render_text_lists_section_and_actions() {
    let spec = survey();
    let answers = AnswerSet::new("financing-needs");
    let payload =
        build_render_payload(&spec, &answers, 0, &ErrorMap::new(), true).expect("payload");

    assert_eq!(payload.status, RenderStatus::NeedInput);
    assert!(payload.is_first);
    assert!(payload.can_save_draft);

    let text = render_text(&payload);
    assert!(text.contains("== Your company =="));
    assert!(text.contains("company_name"));
    assert!(text.contains("Actions: save draft, next"));
}

#[test]
fn render_json_ui_exposes_structure() {
    let spec = survey();
    let mut answers = AnswerSet::new("financing-needs");
    answers.insert("company_name", AnswerValue::from("Acme"));
    answers.insert("industry", AnswerValue::from("other").with_custom("fintech"));
    let payload =
        build_render_payload(&spec, &answers, 0, &ErrorMap::new(), false).expect("payload");

    let ui = render_json_ui(&payload);
    assert_eq!(ui["survey_id"], "financing-needs");
    assert_eq!(ui["can_save_draft"], false);
    assert_eq!(ui["progress"]["sections"], 2);
    let questions = ui["questions"].as_array().expect("questions array");
    let industry = questions
        .iter()
        .find(|question| question["id"] == "industry")
        .expect("industry question");
    assert_eq!(industry["text"], "Which industry does Acme operate in?");
    assert_eq!(industry["custom_input"]["active"], true);
    assert_eq!(industry["custom_input"]["value"], "fintech");
    assert_eq!(
        industry["current_value"],
        json!({ "main": "other", "custom": "fintech" })
    );
}

#[test]
fn render_marks_errors_and_last_section() {
    let spec: SurveyDefinition = serde_json::from_str(fixture("branching")).expect("deserialize");
    let mut answers = AnswerSet::new("branching");
    answers.insert("q1", AnswerValue::from("yes"));
    let errors = validate_all(&spec, &answers);
    let payload = build_render_payload(&spec, &answers, 1, &errors, true).expect("payload");

    assert_eq!(payload.status, RenderStatus::Error);
    assert!(payload.is_last);
    assert!(!payload.can_save_draft);
    assert_eq!(payload.progress.map(|progress| progress.percent), Some(100.0));
    let text = render_text(&payload);
    assert!(text.contains("required_field_missing"));
    assert!(text.contains("Actions: back, submit"));
}

#[test]
fn render_hides_progress_when_disabled() {
    let mut spec = survey();
    spec.settings.show_progress = false;
    let payload = build_render_payload(
        &spec,
        &AnswerSet::new("financing-needs"),
        1,
        &ErrorMap::new(),
        true,
    )
    .expect("payload");
    assert!(payload.progress.is_none());
    assert!(render_json_ui(&payload)["progress"].is_null());
}

#[test]
fn out_of_range_position_yields_nothing() {
    let spec = survey();
    assert!(
        build_render_payload(&spec, &AnswerSet::new("x"), 7, &ErrorMap::new(), true).is_none()
    );
}
