//! `no-guarded-throw`: a throw must behave the same in every environment.

use oxc_ast::ast::{Program, ThrowStatement};
use std::collections::BTreeMap;

use super::{LintContext, Rule};
use crate::guard::{classify, GuardFrame};
use crate::visitor::{walk_program, GuardVisitor};

pub const NAME: &str = "no-guarded-throw";

const GUARDED_THROW: &str = "Do not wrap throw statements in a process.env.NODE_ENV check. \
Errors must be thrown identically in development and production.";

pub struct NoGuardedThrow;

impl Rule for NoGuardedThrow {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check<'a>(&self, ctx: &mut LintContext<'_>, program: &Program<'a>) {
        let source = ctx.source();
        walk_program(program, source, ThrowChecker { ctx });
    }
}

struct ThrowChecker<'c, 's> {
    ctx: &'c mut LintContext<'s>,
}

impl<'a> GuardVisitor<'a> for ThrowChecker<'_, '_> {
    fn visit_throw(&mut self, stmt: &ThrowStatement<'a>, frames: &[GuardFrame]) {
        if classify(frames).is_env_guarded() {
            self.ctx
                .report(stmt.span, "guardedThrow", GUARDED_THROW, BTreeMap::new());
        }
    }
}
