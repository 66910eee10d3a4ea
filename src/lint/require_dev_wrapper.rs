//! `require-dev-wrapper`: development helpers must sit behind a dev-only guard
//! so dead-code elimination removes them from production bundles.

use oxc_ast::ast::{CallExpression, Expression, Program};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

use super::{LintContext, Rule};
use crate::error::ConfigError;
use crate::guard::{classify, GuardFrame, GuardVerdict};
use crate::visitor::{walk_program, GuardVisitor};

pub const NAME: &str = "require-dev-wrapper";

const MISSING_DEV_WRAPPER: &str = "{{functionName}}() must be wrapped in a development-only guard: \
if (process.env.NODE_ENV !== 'production').";

lazy_static::lazy_static! {
    static ref DEFAULT_FUNCTION_NAMES: Vec<String> =
        ["warnOnce", "warn", "checkSlot"].iter().map(|s| s.to_string()).collect();
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequireDevWrapperOptions {
    #[serde(default = "default_function_names")]
    pub function_names: Vec<String>,
}

fn default_function_names() -> Vec<String> {
    DEFAULT_FUNCTION_NAMES.clone()
}

impl Default for RequireDevWrapperOptions {
    fn default() -> Self {
        Self {
            function_names: default_function_names(),
        }
    }
}

impl RequireDevWrapperOptions {
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|source| ConfigError::InvalidOptions {
            target: NAME.to_string(),
            source,
        })
    }
}

pub struct RequireDevWrapper {
    function_names: HashSet<String>,
}

impl RequireDevWrapper {
    pub fn new(options: RequireDevWrapperOptions) -> Self {
        Self {
            function_names: options.function_names.into_iter().collect(),
        }
    }
}

impl Rule for RequireDevWrapper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> Value {
        json!([{
            "type": "object",
            "properties": {
                "functionNames": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "additionalProperties": false
        }])
    }

    fn check<'a>(&self, ctx: &mut LintContext<'_>, program: &Program<'a>) {
        let source = ctx.source();
        walk_program(
            program,
            source,
            WrapperChecker {
                names: &self.function_names,
                ctx,
            },
        );
    }
}

struct WrapperChecker<'c, 's> {
    names: &'c HashSet<String>,
    ctx: &'c mut LintContext<'s>,
}

impl<'a> GuardVisitor<'a> for WrapperChecker<'_, '_> {
    fn visit_call(&mut self, call: &CallExpression<'a>, frames: &[GuardFrame]) {
        let Expression::Identifier(callee) = &call.callee else {
            return;
        };
        if !self.names.contains(callee.name.as_str()) || classify(frames) == GuardVerdict::DevOnly {
            return;
        }
        let mut data = BTreeMap::new();
        data.insert("functionName".to_string(), callee.name.to_string());
        self.ctx
            .report(call.span, "missingDevWrapper", MISSING_DEV_WRAPPER, data);
    }
}
