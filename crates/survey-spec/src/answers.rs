use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_cbor::{to_vec, value::to_value};
use serde_json::{Number, Value};

/// A recorded answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(Number),
    Text(String),
    Choices(Vec<String>),
    /// Single choice augmented with the custom-input text.
    WithCustom { main: String, custom: String },
    /// Multi-select augmented with the custom-input text.
    ChoicesWithCustom { options: Vec<String>, custom: String },
}

impl AnswerValue {
    /// Empty strings, empty selections and composites with nothing selected count as unanswered.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Number(_) => false,
            AnswerValue::Text(text) => text.is_empty(),
            AnswerValue::Choices(options) => options.is_empty(),
            AnswerValue::WithCustom { main, .. } => main.is_empty(),
            AnswerValue::ChoicesWithCustom { options, .. } => options.is_empty(),
        }
    }

    /// Serialized scalar form used to look up conditional logic.
    ///
    /// Multi-select answers have no scalar form.
    pub fn logic_key(&self) -> Option<String> {
        match self {
            AnswerValue::Number(number) => Some(number.to_string()),
            AnswerValue::Text(text) => Some(text.clone()),
            AnswerValue::WithCustom { main, .. } => Some(main.clone()),
            AnswerValue::Choices(_) | AnswerValue::ChoicesWithCustom { .. } => None,
        }
    }

    /// Strict equality against a `showWhen` value.
    pub fn matches(&self, expected: &Value) -> bool {
        match (self, expected) {
            (AnswerValue::Text(text), Value::String(other)) => text == other,
            (AnswerValue::Number(number), Value::Number(other)) => {
                match (number.as_f64(), other.as_f64()) {
                    (Some(left), Some(right)) => left == right,
                    _ => number == other,
                }
            }
            (AnswerValue::Choices(options), Value::Array(values)) => {
                options.len() == values.len()
                    && options
                        .iter()
                        .zip(values)
                        .all(|(option, value)| value.as_str() == Some(option.as_str()))
            }
            (AnswerValue::WithCustom { .. }, Value::Object(_))
            | (AnswerValue::ChoicesWithCustom { .. }, Value::Object(_)) => {
                serde_json::to_value(self).is_ok_and(|value| &value == expected)
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            AnswerValue::WithCustom { main, .. } => Some(main),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// Options picked in a multi-select answer.
    pub fn selected(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Choices(options) => Some(options),
            AnswerValue::ChoicesWithCustom { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn custom_text(&self) -> Option<&str> {
        match self {
            AnswerValue::WithCustom { custom, .. }
            | AnswerValue::ChoicesWithCustom { custom, .. } => Some(custom),
            _ => None,
        }
    }

    /// Whether this answer selects the option that reveals a custom input.
    pub fn triggers(&self, option: &str) -> bool {
        match self {
            AnswerValue::Text(text) => text == option,
            AnswerValue::WithCustom { main, .. } => main == option,
            AnswerValue::Choices(options) | AnswerValue::ChoicesWithCustom { options, .. } => {
                options.iter().any(|selected| selected == option)
            }
            AnswerValue::Number(_) => false,
        }
    }

    /// Attaches custom-input text, turning scalars and selections into composites.
    pub fn with_custom(self, custom: impl Into<String>) -> Self {
        let custom = custom.into();
        match self {
            AnswerValue::Text(main) | AnswerValue::WithCustom { main, .. } => {
                AnswerValue::WithCustom { main, custom }
            }
            AnswerValue::Choices(options) | AnswerValue::ChoicesWithCustom { options, .. } => {
                AnswerValue::ChoicesWithCustom { options, custom }
            }
            number @ AnswerValue::Number(_) => number,
        }
    }

    /// Drops any attached custom text.
    pub fn without_custom(self) -> Self {
        match self {
            AnswerValue::WithCustom { main, .. } => AnswerValue::Text(main),
            AnswerValue::ChoicesWithCustom { options, .. } => AnswerValue::Choices(options),
            other => other,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(number) => write!(f, "{}", number),
            AnswerValue::Text(text) => f.write_str(text),
            AnswerValue::Choices(options) => f.write_str(&options.join(", ")),
            AnswerValue::WithCustom { main, custom } => write!(f, "{} ({})", main, custom),
            AnswerValue::ChoicesWithCustom { options, custom } => {
                write!(f, "{} ({})", options.join(", "), custom)
            }
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Number(Number::from(value))
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(values: Vec<&str>) -> Self {
        AnswerValue::Choices(values.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(values: Vec<String>) -> Self {
        AnswerValue::Choices(values)
    }
}

/// In-memory answers for one form session, keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerSet {
    pub survey_id: String,
    #[serde(default, deserialize_with = "deserialize_answers")]
    #[schemars(with = "BTreeMap<String, AnswerValue>")]
    answers: BTreeMap<String, AnswerValue>,
}

/// `null` entries are treated as unanswered rather than rejected.
fn deserialize_answers<'de, D>(deserializer: D) -> Result<BTreeMap<String, AnswerValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Option<AnswerValue>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(id, value)| value.map(|value| (id, value)))
        .collect())
}

impl AnswerSet {
    /// Creates a fresh empty answer set for a survey.
    pub fn new(survey_id: impl Into<String>) -> Self {
        Self {
            survey_id: survey_id.into(),
            answers: BTreeMap::new(),
        }
    }

    pub fn get(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    pub fn insert(
        &mut self,
        question_id: impl Into<String>,
        value: AnswerValue,
    ) -> Option<AnswerValue> {
        self.answers.insert(question_id.into(), value)
    }

    pub fn remove(&mut self, question_id: &str) -> Option<AnswerValue> {
        self.answers.remove(question_id)
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.answers.iter()
    }

    pub fn question_ids(&self) -> impl Iterator<Item = &str> {
        self.answers.keys().map(String::as_str)
    }

    /// Answer map as a JSON object, the shape templates and renderers consume.
    pub fn to_json_map(&self) -> Value {
        serde_json::to_value(&self.answers).unwrap_or(Value::Null)
    }

    /// Serializes the answer set as canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        let canonical = to_value(self)?;
        to_vec(&canonical)
    }

    /// Serializes the answer set as indented JSON for debugging.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Machine-readable validation failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RequiredFieldMissing,
    TypeMismatch,
    InvalidOption,
    OutOfRange,
    InvalidEmail,
    PatternMismatch,
    MinLength,
    MaxLength,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RequiredFieldMissing => "required_field_missing",
            ErrorCode::TypeMismatch => "type_mismatch",
            ErrorCode::InvalidOption => "invalid_option",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::InvalidEmail => "invalid_email",
            ErrorCode::PatternMismatch => "pattern_mismatch",
            ErrorCode::MinLength => "min_length",
            ErrorCode::MaxLength => "max_length",
        }
    }
}

/// Validation error metadata reported for a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    pub question_id: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Validation errors keyed by question id.
pub type ErrorMap = BTreeMap<String, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untagged_answers_round_trip_shapes() {
        let set: AnswerSet = serde_json::from_value(json!({
            "survey_id": "s",
            "answers": {
                "amount": 25000,
                "purpose": "other",
                "channels": ["email", "phone"],
                "source": { "main": "other", "custom": "podcast" },
                "extras": { "options": ["a"], "custom": "b" },
                "skipped": null
            }
        }))
        .unwrap();
        assert_eq!(set.get("amount").and_then(AnswerValue::as_f64), Some(25000.0));
        assert_eq!(set.get("purpose"), Some(&AnswerValue::from("other")));
        assert_eq!(
            set.get("source").and_then(AnswerValue::custom_text),
            Some("podcast")
        );
        assert!(matches!(
            set.get("extras"),
            Some(AnswerValue::ChoicesWithCustom { .. })
        ));
        assert!(!set.contains("skipped"));
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn emptiness_covers_strings_and_selections() {
        assert!(AnswerValue::from("").is_empty());
        assert!(AnswerValue::Choices(Vec::new()).is_empty());
        assert!(!AnswerValue::from(0).is_empty());
        assert!(!AnswerValue::from(vec!["x"]).is_empty());
    }

    #[test]
    fn numbers_match_numerically() {
        let answer = AnswerValue::from(5);
        assert!(answer.matches(&json!(5.0)));
        assert!(!answer.matches(&json!("5")));
        assert!(!AnswerValue::from("yes").matches(&json!(["yes"])));
    }

    #[test]
    fn custom_text_attaches_and_detaches() {
        let answer = AnswerValue::from("other").with_custom("word of mouth");
        assert_eq!(answer.logic_key().as_deref(), Some("other"));
        assert!(answer.triggers("other"));
        assert_eq!(answer.clone().without_custom(), AnswerValue::from("other"));
        let multi = AnswerValue::from(vec!["a", "other"]).with_custom("c");
        assert_eq!(multi.selected().map(<[String]>::len), Some(2));
        assert_eq!(multi.logic_key(), None);
    }

    #[test]
    fn cbor_encoding_is_stable() {
        let mut set = AnswerSet::new("s");
        set.insert("b", AnswerValue::from("2"));
        set.insert("a", AnswerValue::from(1));
        let first = set.to_cbor().unwrap();
        let second = set.clone().to_cbor().unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
