use std::sync::LazyLock;

use handlebars::{Handlebars, RenderError, no_escape};
use serde_json::json;
use thiserror::Error;

use crate::answers::AnswerSet;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render template: {0}")]
    Render(#[from] RenderError),
}

static SHARED: LazyLock<TemplateEngine> = LazyLock::new(TemplateEngine::new);

/// Interpolates earlier answers into question and section text via `{{answers.<id>}}`.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.set_strict_mode(false);
        Self { registry }
    }

    /// Process-wide engine used when building render payloads.
    pub fn shared() -> &'static TemplateEngine {
        &SHARED
    }

    /// Renders `template` against the answers; plain text is returned as is.
    pub fn render(&self, template: &str, answers: &AnswerSet) -> Result<String, TemplateError> {
        if !template.contains("{{") {
            return Ok(template.to_string());
        }
        let data = json!({
            "survey_id": answers.survey_id,
            "answers": answers.to_json_map(),
        });
        Ok(self.registry.render_template(template, &data)?)
    }

    /// Like [`TemplateEngine::render`], falling back to the raw template on errors.
    pub fn render_or_raw(&self, template: &str, answers: &AnswerSet) -> String {
        self.render(template, answers).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "template rendering failed");
            template.to_string()
        })
    }
}
