use handlebars::{Handlebars, handlebars_helper, no_escape};
use serde::Serialize;
use serde_json::{self, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TEngineError {
    #[error("Template error: {0}")]
    TemplateError(#[from] handlebars::TemplateError),
    #[error("Render error: {0}")]
    RenderError(#[from] handlebars::RenderError),
}

/// Handlebars wrapper used to render the agent transcript.
///
/// HTML escaping is disabled (prompts are plain text) and a `verbatim`
/// helper prints any value as compact JSON.
pub struct TEngine {
    handlebars: Handlebars<'static>,
}

impl Default for TEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TEngine {
    pub fn new() -> Self {
        let mut te = TEngine {
            handlebars: Handlebars::new(),
        };
        handlebars_helper!(verbatim: |v: Value| serde_json::to_string(&v).unwrap_or_default());
        te.handlebars.register_escape_fn(no_escape);
        te.handlebars.register_helper("verbatim", Box::new(verbatim));
        te
    }

    pub fn register_template_string(
        &mut self,
        name: &str,
        template: &str,
    ) -> Result<(), TEngineError> {
        self.handlebars.register_template_string(name, template)?;
        Ok(())
    }

    /// Renders a template previously registered under `name`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, TEngineError> {
        Ok(self.handlebars.render(name, data)?)
    }
}
