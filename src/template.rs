//! Prompt templating with strict undefined-variable semantics.
//!
//! Templates are rendered against the resolved inputs of an output. Any
//! reference to a missing name fails the render (and thereby the operation)
//! instead of silently emitting an empty string. Rendered text is dedented
//! and trimmed so multi-line templates can be written indented in the
//! pipeline document.

use minijinja::{Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use serde_json::Value;
use thiserror::Error;

static TEMPLATE_ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env
});

/// Template rendering failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template render failed: {0}")]
    Render(#[from] minijinja::Error),

    #[error("template not provided")]
    Missing,
}

/// Render `template` against `inputs`, then collapse common indentation and
/// trim surrounding whitespace.
pub fn render_template(template: &str, inputs: &Value) -> Result<String, TemplateError> {
    let rendered = TEMPLATE_ENV.render_str(template, inputs)?;
    Ok(dedent(&rendered).trim().to_string())
}

/// Remove the longest common leading whitespace from all non-blank lines.
fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    if margin == 0 {
        return text.to_string();
    }

    text.lines()
        .map(|line| if line.len() >= margin { &line[margin..] } else { line.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
}
