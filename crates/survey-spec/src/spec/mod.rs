pub mod question;
pub mod section;
pub mod survey;

pub use question::{
    ChoiceOption, ConditionalEffect, Constraint, CustomInput, HideTarget, Question, QuestionType,
    ScaleSpec, ShowWhen,
};
pub use section::Section;
pub use survey::{DefinitionError, SurveyDefinition, SurveySettings};
