use clap::ValueEnum;
use survey_session::HandlerError;
use survey_spec::{
    AnswerSet, AnswerValue, ErrorMap, QuestionType, RenderPayload, RenderQuestion, render_json_ui,
    render_text,
};

/// How each section is drawn before its prompts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenderMode {
    Text,
    Json,
}

/// Prints sections, prompts and outcomes for the interactive runner.
pub struct WizardPresenter {
    mode: RenderMode,
    shown_section: Option<String>,
}

impl WizardPresenter {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            shown_section: None,
        }
    }

    /// Draws the section once per visit.
    pub fn show_section(&mut self, payload: &RenderPayload) {
        if self.shown_section.as_deref() == Some(payload.section_id.as_str()) {
            return;
        }
        self.redraw(payload);
    }

    /// Draws the section again, e.g. after navigation or validation errors.
    pub fn redraw(&mut self, payload: &RenderPayload) {
        match self.mode {
            RenderMode::Text => println!("\n{}", render_text(payload)),
            RenderMode::Json => match serde_json::to_string_pretty(&render_json_ui(payload)) {
                Ok(ui) => println!("{}", ui),
                Err(err) => eprintln!("Failed to render section as JSON: {}", err),
            },
        }
        self.shown_section = Some(payload.section_id.clone());
    }

    pub fn forget_section(&mut self) {
        self.shown_section = None;
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.text);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        for (position, choice) in prompt.choices.iter().enumerate() {
            println!("  {}) {}", position + 1, choice);
        }
        if let Some(current) = &prompt.current {
            println!("Current answer: {} (press enter to keep)", current);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_errors(&self, errors: &ErrorMap) {
        if errors.is_empty() {
            return;
        }
        eprintln!("Please fix the following answers:");
        for (question_id, error) in errors {
            eprintln!("  {}: {} ({})", question_id, error.message, error.code.as_str());
        }
    }

    pub fn show_submit_failure(&self, error: &HandlerError) {
        eprintln!("Submitting failed: {}", error);
        eprintln!("Your answers are kept.");
    }

    pub fn show_notice(&self, message: &str) {
        println!("{}", message);
    }

    pub fn show_completion(&self, answers: &AnswerSet) {
        println!("Done ✅");
        match answers.to_cbor() {
            Ok(bytes) => println!("Answers (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize answers to CBOR: {}", err),
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub text: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    pub current: Option<String>,
}

impl PromptContext {
    /// `index` is 1-based among the visible questions of the section.
    pub fn new(question: &RenderQuestion, index: usize, total: usize) -> Self {
        let choices = question
            .options
            .iter()
            .map(|option| {
                if option.label == option.value {
                    option.label.clone()
                } else {
                    format!("{} [{}]", option.label, option.value)
                }
            })
            .collect();
        Self {
            index: index.max(1),
            total,
            text: question.text.clone(),
            description: question.description.clone(),
            required: question.required,
            hint: hint_for(question),
            choices,
            current: question.current_value.as_ref().map(AnswerValue::to_string),
        }
    }
}

fn hint_for(question: &RenderQuestion) -> Option<String> {
    match question.kind {
        QuestionType::Radio => Some("(pick one by number or value)".to_string()),
        QuestionType::Checkbox => Some("(comma separated numbers or values)".to_string()),
        QuestionType::Scale => question.scale.as_ref().map(|scale| {
            match (&scale.min_label, &scale.max_label) {
                (Some(low), Some(high)) => {
                    format!("({}={} .. {}={})", scale.min, low, scale.max, high)
                }
                _ => format!("({}-{})", scale.min, scale.max),
            }
        }),
        QuestionType::Number => Some("(number)".to_string()),
        QuestionType::Email => Some("(email)".to_string()),
        QuestionType::Text | QuestionType::Textarea => {
            question.placeholder.as_ref().map(|text| format!("({})", text))
        }
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_spec::{ChoiceOption, ScaleSpec};

    fn question(kind: QuestionType) -> RenderQuestion {
        RenderQuestion {
            id: "q".into(),
            text: "Question".into(),
            description: None,
            placeholder: None,
            kind,
            required: true,
            visible: true,
            current_value: None,
            options: Vec::new(),
            scale: None,
            custom_input: None,
            error: None,
        }
    }

    #[test]
    fn prompt_lists_labels_with_values() {
        let mut radio = question(QuestionType::Radio);
        radio.options = vec![
            ChoiceOption {
                value: "yes".into(),
                label: "Yes".into(),
            },
            ChoiceOption {
                value: "maybe".into(),
                label: "maybe".into(),
            },
        ];
        radio.current_value = Some(AnswerValue::from("yes"));
        let prompt = PromptContext::new(&radio, 0, 2);
        assert_eq!(prompt.index, 1);
        assert_eq!(prompt.choices, vec!["Yes [yes]", "maybe"]);
        assert_eq!(prompt.current.as_deref(), Some("yes"));
    }

    #[test]
    fn scale_hint_uses_labels_when_present() {
        let mut rating = question(QuestionType::Scale);
        rating.scale = Some(ScaleSpec {
            min: 1,
            max: 5,
            min_label: Some("Poor".into()),
            max_label: Some("Great".into()),
        });
        assert_eq!(hint_for(&rating).as_deref(), Some("(1=Poor .. 5=Great)"));
        rating.scale = Some(ScaleSpec {
            min: 0,
            max: 10,
            min_label: None,
            max_label: None,
        });
        assert_eq!(hint_for(&rating).as_deref(), Some("(0-10)"));
    }

    #[test]
    fn hex_encoding_is_lowercase_pairs() {
        assert_eq!(encode_hex(&[0x00, 0xab, 0x1f]), "00ab1f");
    }
}
