use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Visibility predicate: every listed question must hold exactly the given answer.
pub type ShowWhen = BTreeMap<String, Value>;

/// Supported question input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Radio,
    #[serde(alias = "multiple_choice")]
    Checkbox,
    #[serde(alias = "rating")]
    Scale,
    Textarea,
    Text,
    Number,
    Email,
}

impl QuestionType {
    /// Types whose answers are picked from `options`.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::Radio | QuestionType::Checkbox)
    }

    /// Types that accept several selected options.
    pub fn is_multi_select(&self) -> bool {
        matches!(self, QuestionType::Checkbox)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Radio => "radio",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Scale => "scale",
            QuestionType::Textarea => "textarea",
            QuestionType::Text => "text",
            QuestionType::Number => "number",
            QuestionType::Email => "email",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selectable option for radio and checkbox questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// Bounds and end labels for rating questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSpec {
    pub min: i64,
    pub max: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_label: Option<String>,
}

/// Auxiliary free-text field attached when a specific option is picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomInput {
    pub show_when: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(rename = "type", default = "default_custom_input_type")]
    pub kind: QuestionType,
}

fn default_custom_input_type() -> QuestionType {
    QuestionType::Text
}

/// Constraints that can be enforced per question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

/// Target of a `hideQuestions` effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HideTarget {
    /// A single question by id.
    Specific(String),
    /// Every question outside the section of the answered question.
    AllOthers,
}

impl HideTarget {
    pub const ALL_OTHERS: &'static str = "all_other_questions";

    pub fn as_str(&self) -> &str {
        match self {
            HideTarget::Specific(id) => id,
            HideTarget::AllOthers => Self::ALL_OTHERS,
        }
    }
}

impl From<&str> for HideTarget {
    fn from(raw: &str) -> Self {
        if raw == Self::ALL_OTHERS {
            HideTarget::AllOthers
        } else {
            HideTarget::Specific(raw.to_string())
        }
    }
}

impl Serialize for HideTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HideTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(HideTarget::from(raw.as_str()))
    }
}

/// Side effect triggered when a question receives a particular answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalEffect {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<String>")]
    pub hide_questions: Vec<HideTarget>,
}

/// Definition of a single question inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_input: Option<CustomInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when: Option<ShowWhen>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditional_logic: BTreeMap<String, ConditionalEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
}

impl Question {
    /// Creates a question with no options, rules or predicates.
    pub fn new(id: impl Into<String>, kind: QuestionType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
            description: None,
            placeholder: None,
            required: false,
            options: Vec::new(),
            scale: None,
            custom_input: None,
            show_when: None,
            conditional_logic: BTreeMap::new(),
            constraint: None,
        }
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|option| option.value == value)
    }

    /// Looks up the effect registered for an answer key.
    pub fn effect_for(&self, key: &str) -> Option<&ConditionalEffect> {
        self.conditional_logic.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_type_accepts_aliases() {
        let kind: QuestionType = serde_json::from_value(json!("multiple_choice")).unwrap();
        assert_eq!(kind, QuestionType::Checkbox);
        let kind: QuestionType = serde_json::from_value(json!("rating")).unwrap();
        assert_eq!(kind, QuestionType::Scale);
    }

    #[test]
    fn hide_target_parses_sentinel() {
        let effect: ConditionalEffect = serde_json::from_value(json!({
            "hideQuestions": ["q2", "all_other_questions"]
        }))
        .unwrap();
        assert_eq!(
            effect.hide_questions,
            vec![HideTarget::Specific("q2".into()), HideTarget::AllOthers]
        );
        let back = serde_json::to_value(&effect).unwrap();
        assert_eq!(back["hideQuestions"][1], "all_other_questions");
    }

    #[test]
    fn custom_input_defaults_to_text() {
        let custom: CustomInput =
            serde_json::from_value(json!({ "showWhen": "other", "placeholder": "Specify" }))
                .unwrap();
        assert_eq!(custom.kind, QuestionType::Text);
    }
}
