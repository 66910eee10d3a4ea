//! `consistent-production-guard`: `process.env.NODE_ENV` may only appear in a
//! strict comparison against `'production'`.

use oxc_ast::ast::{BinaryExpression, Expression, Program, StaticMemberExpression};
use oxc_span::GetSpan;
use std::collections::BTreeMap;

use super::{LintContext, Rule};
use crate::guard::literal_value;
use crate::parse::span_text;
use crate::visitor::{walk_program, GuardVisitor};

pub const NAME: &str = "consistent-production-guard";

const INVALID_COMPARISON: &str =
    "process.env.NODE_ENV must be compared against 'production', not {{comparedValue}}.";
const INVALID_USAGE: &str =
    "process.env.NODE_ENV must be used in a === or !== comparison against 'production'.";

pub struct ConsistentProductionGuard;

impl Rule for ConsistentProductionGuard {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check<'a>(&self, ctx: &mut LintContext<'_>, program: &Program<'a>) {
        let source = ctx.source();
        walk_program(program, source, UsageChecker { ctx });
    }
}

struct UsageChecker<'c, 's> {
    ctx: &'c mut LintContext<'s>,
}

impl<'a> GuardVisitor<'a> for UsageChecker<'_, '_> {
    fn visit_node_env_comparison(
        &mut self,
        _comparison: &BinaryExpression<'a>,
        comparand: &Expression<'a>,
    ) {
        let source = self.ctx.source();
        if literal_value(comparand, source).is_some_and(|value| value.is_production()) {
            return;
        }
        let mut data = BTreeMap::new();
        data.insert(
            "comparedValue".to_string(),
            span_text(source, comparand.span()).to_string(),
        );
        self.ctx
            .report(comparand.span(), "invalidComparison", INVALID_COMPARISON, data);
    }

    fn visit_node_env_usage(&mut self, member: &StaticMemberExpression<'a>) {
        self.ctx
            .report(member.span, "invalidUsage", INVALID_USAGE, BTreeMap::new());
    }
}
