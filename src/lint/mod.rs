//! Lint rules enforcing the production guard discipline.
//!
//! Rules are built once from their options and are immutable afterwards; a
//! [`Linter`] parses each file once and runs every enabled rule over it.

pub mod consistent_production_guard;
pub mod no_guarded_throw;
pub mod require_dev_wrapper;

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_span::Span;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ConfigError, TransformError};
use crate::parse::{parse_program, LineIndex};

pub use consistent_production_guard::ConsistentProductionGuard;
pub use no_guarded_throw::NoGuardedThrow;
pub use require_dev_wrapper::{RequireDevWrapper, RequireDevWrapperOptions};

pub const RULE_NAMES: [&str; 3] = [
    no_guarded_throw::NAME,
    consistent_production_guard::NAME,
    require_dev_wrapper::NAME,
];

lazy_static! {
    static ref MESSAGE_PLACEHOLDER: Regex = Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

impl Severity {
    /// Parses an ESLint severity. `Ok(None)` means the rule is off.
    fn parse(rule: &str, value: &Value) -> Result<Option<Self>, ConfigError> {
        match value {
            Value::String(s) if s == "off" => Ok(None),
            Value::String(s) if s == "warn" => Ok(Some(Severity::Warn)),
            Value::String(s) if s == "error" => Ok(Some(Severity::Error)),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(None),
            Value::Number(n) if n.as_u64() == Some(1) => Ok(Some(Severity::Warn)),
            Value::Number(n) if n.as_u64() == Some(2) => Ok(Some(Severity::Error)),
            other => Err(ConfigError::InvalidSeverity {
                rule: rule.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintDiagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message_id: String,
    pub message: String,
    pub data: BTreeMap<String, String>,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub start: u32,
    pub end: u32,
}

/// Fills `{{name}}` placeholders from `data`; unknown names are left as is.
pub fn render_message(template: &str, data: &BTreeMap<String, String>) -> String {
    MESSAGE_PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| match data.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Per-file, per-rule reporting channel.
pub struct LintContext<'s> {
    source: &'s str,
    file: &'s str,
    index: &'s LineIndex<'s>,
    rule: &'static str,
    severity: Severity,
    diagnostics: Vec<LintDiagnostic>,
}

impl<'s> LintContext<'s> {
    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn report(
        &mut self,
        span: Span,
        message_id: &str,
        template: &str,
        data: BTreeMap<String, String>,
    ) {
        let (line, column) = self.index.line_col(span.start);
        self.diagnostics.push(LintDiagnostic {
            rule: self.rule.to_string(),
            severity: self.severity,
            message_id: message_id.to_string(),
            message: render_message(template, &data),
            data,
            file: self.file.to_string(),
            line,
            column,
            start: span.start,
            end: span.end,
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RULES
// ═══════════════════════════════════════════════════════════════════════════════

pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Declarative options schema, ESLint style (an array of positional schemas).
    fn schema(&self) -> Value {
        serde_json::json!([])
    }

    fn check<'a>(&self, ctx: &mut LintContext<'_>, program: &Program<'a>);
}

/// Builds a rule from its name and optional options object.
pub fn create_rule(name: &str, options: Option<&Value>) -> Result<Box<dyn Rule>, ConfigError> {
    let no_options = |rule: Box<dyn Rule>| match options {
        Some(_) => Err(ConfigError::UnexpectedOptions {
            rule: name.to_string(),
        }),
        None => Ok(rule),
    };
    match name {
        no_guarded_throw::NAME => no_options(Box::new(NoGuardedThrow)),
        consistent_production_guard::NAME => no_options(Box::new(ConsistentProductionGuard)),
        require_dev_wrapper::NAME => {
            let options = match options {
                Some(value) => RequireDevWrapperOptions::from_json(value.clone())?,
                None => RequireDevWrapperOptions::default(),
            };
            Ok(Box::new(RequireDevWrapper::new(options)))
        }
        other => Err(ConfigError::UnknownRule(other.to_string())),
    }
}

/// Option schemas of every rule, keyed by rule name.
pub fn rule_schemas() -> BTreeMap<&'static str, Value> {
    RULE_NAMES
        .iter()
        .filter_map(|name| create_rule(name, None).ok())
        .map(|rule| (rule.name(), rule.schema()))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINTER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Linter {
    rules: Vec<(Severity, Box<dyn Rule>)>,
}

impl Linter {
    /// All rules enabled as errors with default options.
    pub fn recommended() -> Self {
        let rules = vec![
            (Severity::Error, Box::new(NoGuardedThrow) as Box<dyn Rule>),
            (Severity::Error, Box::new(ConsistentProductionGuard)),
            (
                Severity::Error,
                Box::new(RequireDevWrapper::new(RequireDevWrapperOptions::default())),
            ),
        ];
        Self { rules }
    }

    /// Builds a linter from an ESLint-shaped rules object:
    /// `{ "<rule>": "error" | "warn" | "off" | 0 | 1 | 2 | [severity, options] }`.
    pub fn from_config(config: &Value) -> Result<Self, ConfigError> {
        let Value::Object(entries) = config else {
            return Err(ConfigError::InvalidConfig(
                "rules configuration must be an object".to_string(),
            ));
        };
        let mut rules = Vec::new();
        for (name, entry) in entries {
            let (severity, options) = match entry {
                Value::Array(items) => match items.as_slice() {
                    [severity] => (severity, None),
                    [severity, options] => (severity, Some(options)),
                    _ => {
                        return Err(ConfigError::InvalidConfig(format!(
                            "rule \"{name}\" takes [severity] or [severity, options]"
                        )))
                    }
                },
                severity => (severity, None),
            };
            // Validate options even for disabled rules.
            let rule = create_rule(name, options)?;
            if let Some(severity) = Severity::parse(name, severity)? {
                rules.push((severity, rule));
            }
        }
        Ok(Self { rules })
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|(_, rule)| rule.name()).collect()
    }

    /// Lints one file. Diagnostics are ordered by position, then rule name.
    pub fn lint(&self, source: &str, file_path: &str) -> Result<Vec<LintDiagnostic>, TransformError> {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, source, file_path)?;
        let index = LineIndex::new(source);

        let mut diagnostics = Vec::new();
        for (severity, rule) in &self.rules {
            let mut ctx = LintContext {
                source,
                file: file_path,
                index: &index,
                rule: rule.name(),
                severity: *severity,
                diagnostics: Vec::new(),
            };
            rule.check(&mut ctx, &program);
            tracing::debug!(
                rule = rule.name(),
                file = file_path,
                count = ctx.diagnostics.len(),
                "rule finished"
            );
            diagnostics.append(&mut ctx.diagnostics);
        }
        diagnostics.sort_by(|a, b| (a.start, &a.rule).cmp(&(b.start, &b.rule)));
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_message() {
        let mut data = BTreeMap::new();
        data.insert("functionName".to_string(), "warnOnce".to_string());
        assert_eq!(
            render_message("{{functionName}}() and {{ missing }}", &data),
            "warnOnce() and {{ missing }}"
        );
    }

    #[test]
    fn test_config_severities() {
        let linter = Linter::from_config(&json!({
            "no-guarded-throw": "error",
            "consistent-production-guard": 0,
            "require-dev-wrapper": ["warn", { "functionNames": ["devWarn"] }]
        }))
        .unwrap();
        assert_eq!(linter.rule_names(), vec!["no-guarded-throw", "require-dev-wrapper"]);
    }

    #[test]
    fn test_config_errors() {
        assert!(matches!(
            Linter::from_config(&json!({ "no-such-rule": "error" })),
            Err(ConfigError::UnknownRule(_))
        ));
        assert!(matches!(
            Linter::from_config(&json!({ "no-guarded-throw": ["error", {}] })),
            Err(ConfigError::UnexpectedOptions { .. })
        ));
        assert!(matches!(
            Linter::from_config(&json!({ "no-guarded-throw": "loud" })),
            Err(ConfigError::InvalidSeverity { .. })
        ));
        assert!(matches!(
            Linter::from_config(&json!({
                "require-dev-wrapper": ["error", { "functionNames": ["a"], "extra": true }]
            })),
            Err(ConfigError::InvalidOptions { .. })
        ));
        assert!(matches!(
            Linter::from_config(&json!(["no-guarded-throw"])),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_schemas() {
        let schemas = rule_schemas();
        assert_eq!(schemas.len(), 3);
        assert_eq!(schemas["no-guarded-throw"], json!([]));
        assert_eq!(
            schemas["require-dev-wrapper"][0]["additionalProperties"],
            json!(false)
        );
    }
}
