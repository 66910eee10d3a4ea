use oxc_ast::ast::{
    BinaryExpression, CallExpression, ConditionalExpression, Expression, IfStatement,
    NewExpression, Program, StaticMemberExpression, ThrowStatement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_syntax::operator::BinaryOperator;

use crate::guard::{is_node_env, is_node_env_member, Branch, EnclosingTest, GuardFrame};

/// The GuardVisitor trait is the single traversal mechanism shared by the error
/// transform and the lint rules.
///
/// Rules:
/// 1. Traversal is top-down in source order; hooks fire before children are walked.
/// 2. `frames` is the stack of enclosing conditionals, root first.
/// 3. A `process.env.NODE_ENV` operand of a strict comparison is reported through
///    `visit_node_env_comparison` and never again through `visit_node_env_usage`.
pub trait GuardVisitor<'a> {
    fn visit_throw(&mut self, _stmt: &ThrowStatement<'a>, _frames: &[GuardFrame]) {}

    fn visit_call(&mut self, _call: &CallExpression<'a>, _frames: &[GuardFrame]) {}

    fn visit_new(&mut self, _new: &NewExpression<'a>, _frames: &[GuardFrame]) {}

    /// `process.env.NODE_ENV === comparand` or `!==`, either operand order.
    fn visit_node_env_comparison(
        &mut self,
        _comparison: &BinaryExpression<'a>,
        _comparand: &Expression<'a>,
    ) {
    }

    /// Any other occurrence of `process.env.NODE_ENV`.
    fn visit_node_env_usage(&mut self, _member: &StaticMemberExpression<'a>) {}
}

/// Drives a [`GuardVisitor`] over a program.
pub fn walk_program<'a, V: GuardVisitor<'a>>(
    program: &Program<'a>,
    source: &str,
    visitor: V,
) -> V {
    let mut walker = GuardWalker {
        source,
        frames: Vec::new(),
        visitor,
    };
    walker.visit_program(program);
    walker.visitor
}

struct GuardWalker<'s, V> {
    source: &'s str,
    frames: Vec<GuardFrame>,
    visitor: V,
}

impl<'s, V> GuardWalker<'s, V> {
    fn with_frame(&mut self, frame: GuardFrame, f: impl FnOnce(&mut Self)) {
        self.frames.push(frame);
        f(self);
        self.frames.pop();
    }
}

impl<'a, 's, V: GuardVisitor<'a>> Visit<'a> for GuardWalker<'s, V> {
    fn visit_if_statement(&mut self, it: &IfStatement<'a>) {
        self.visit_expression(&it.test);
        let test = EnclosingTest::from_expression(&it.test, self.source);
        if let Some(alternate) = &it.alternate {
            self.with_frame(GuardFrame::new(Branch::Consequent, test.clone()), |w| {
                w.visit_statement(&it.consequent)
            });
            self.with_frame(GuardFrame::new(Branch::Alternate, test), |w| {
                w.visit_statement(alternate)
            });
        } else {
            self.with_frame(GuardFrame::new(Branch::Consequent, test), |w| {
                w.visit_statement(&it.consequent)
            });
        }
    }

    fn visit_conditional_expression(&mut self, it: &ConditionalExpression<'a>) {
        self.visit_expression(&it.test);
        let test = EnclosingTest::from_expression(&it.test, self.source);
        self.with_frame(GuardFrame::new(Branch::Consequent, test.clone()), |w| {
            w.visit_expression(&it.consequent)
        });
        self.with_frame(GuardFrame::new(Branch::Alternate, test), |w| {
            w.visit_expression(&it.alternate)
        });
    }

    fn visit_throw_statement(&mut self, it: &ThrowStatement<'a>) {
        self.visitor.visit_throw(it, &self.frames);
        walk::walk_throw_statement(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        self.visitor.visit_call(it, &self.frames);
        walk::walk_call_expression(self, it);
    }

    fn visit_new_expression(&mut self, it: &NewExpression<'a>) {
        self.visitor.visit_new(it, &self.frames);
        walk::walk_new_expression(self, it);
    }

    fn visit_binary_expression(&mut self, it: &BinaryExpression<'a>) {
        if matches!(
            it.operator,
            BinaryOperator::StrictEquality | BinaryOperator::StrictInequality
        ) {
            let comparand = if is_node_env(&it.left) {
                Some(&it.right)
            } else if is_node_env(&it.right) {
                Some(&it.left)
            } else {
                None
            };
            if let Some(comparand) = comparand {
                self.visitor.visit_node_env_comparison(it, comparand);
                self.visit_expression(comparand);
                return;
            }
        }
        walk::walk_binary_expression(self, it);
    }

    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if is_node_env_member(it) {
            self.visitor.visit_node_env_usage(it);
            return;
        }
        walk::walk_static_member_expression(self, it);
    }
}
