//! Parameter substitution in raw source text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::value::{Map, Value};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern should compile"));

/// TemplateError represents a failed substitution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template parameter '{0}'")]
    UnknownParameter(String),

    #[error("template parameter '{name}' is a {type_name}, expected a scalar")]
    NotScalar { name: String, type_name: &'static str },

    #[error("{0}")]
    Engine(String),
}

/// Renders raw source text with a set of parameters before parsing.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, source: &str, params: &Map) -> Result<String, TemplateError>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Map) -> Result<String, TemplateError> + Send + Sync,
{
    fn render(&self, source: &str, params: &Map) -> Result<String, TemplateError> {
        self(source, params)
    }
}

/// PlaceholderRenderer replaces `{{ name }}` with the scalar parameter
/// `name`.
///
/// A snake_case placeholder also finds a PascalCase parameter, so
/// `{{ project_root }}` resolves `ProjectRoot` when `project_root` itself
/// is not set. Anything that is not a placeholder is copied unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    pub fn new() -> Self {
        PlaceholderRenderer
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, source: &str, params: &Map) -> Result<String, TemplateError> {
        let mut error = None;
        let rendered = PLACEHOLDER.replace_all(source, |caps: &Captures<'_>| {
            let name = &caps[1];
            match lookup(params, name).map(|v| scalar_text(name, v)) {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    error.get_or_insert(e);
                    String::new()
                }
                None => {
                    error.get_or_insert(TemplateError::UnknownParameter(name.to_string()));
                    String::new()
                }
            }
        });

        match error {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }
}

fn lookup<'a>(params: &'a Map, name: &str) -> Option<&'a Value> {
    params.get(name).or_else(|| params.get(&to_pascal_case(name)))
}

fn scalar_text(name: &str, value: &Value) -> Result<String, TemplateError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(TemplateError::NotScalar {
            name: name.to_string(),
            type_name: other.type_name(),
        }),
    }
}

/// Converts `snake_case` into `PascalCase`.
pub fn to_pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
