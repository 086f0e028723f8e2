// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::Simplifier;
use crate::expression::{BinaryOperator, ConstantValue, Expr, Expression, UnaryOperator};
use crate::k_limits;
use crate::types::ExpressionType;

use log_derive::logfn_inputs;
use std::rc::Rc;

/// A best effort simplifier. Children are simplified first, then rewrite rules are applied at
/// the root until none applies. Whatever a rule produces is simplified again, so the result is a
/// fixed point: simplifying it once more returns an equal expression.
#[derive(Debug, Default)]
pub struct ExprSimplifier {}

impl Simplifier for ExprSimplifier {
    #[logfn_inputs(TRACE)]
    fn simplify(&self, expr: &Rc<Expr>) -> Rc<Expr> {
        if expr.size() > k_limits::MAX_EXPRESSION_SIZE {
            debug!("not simplifying an expression of size {}", expr.size());
            return expr.clone();
        }
        simplify(expr)
    }
}

fn simplify(expr: &Rc<Expr>) -> Rc<Expr> {
    let expr = expr.map_children(simplify);
    match rewrite(&expr) {
        Some(rewritten) => simplify(&rewritten),
        None => expr,
    }
}

/// Applies one rule at the root of expr, whose children are already simplified.
fn rewrite(expr: &Rc<Expr>) -> Option<Rc<Expr>> {
    match &expr.expression {
        Expression::Binary {
            operator,
            left,
            right,
        } => rewrite_binary(expr, *operator, left, right),
        Expression::ByteExtract { operand, offset } => {
            if offset.as_int_if_known() == Some(0) && operand.expr_type == expr.expr_type {
                return Some(operand.clone());
            }
            push_into_conditional(operand, |branch| {
                Expr::byte_extract(branch.clone(), offset.clone(), expr.expr_type.clone())
            })
        }
        Expression::Cast { operand } => rewrite_cast(expr, operand),
        Expression::ConditionalExpression {
            condition,
            consequent,
            alternate,
        } => {
            if let Some(c) = condition.as_bool_if_known() {
                return Some(if c {
                    consequent.clone()
                } else {
                    alternate.clone()
                });
            }
            if consequent == alternate {
                return Some(consequent.clone());
            }
            if expr.expr_type == ExpressionType::Bool
                && condition.expr_type == ExpressionType::Bool
                && consequent.as_bool_if_known() == Some(true)
                && alternate.as_bool_if_known() == Some(false)
            {
                return Some(condition.clone());
            }
            None
        }
        Expression::Index { array, index } => {
            match (&array.expression, index.as_int_if_known()) {
                (Expression::ArrayLiteral { elements }, Some(i)) => {
                    return usize::try_from(i)
                        .ok()
                        .and_then(|i| elements.get(i))
                        .cloned();
                }
                (
                    Expression::Update {
                        array: base,
                        index: updated,
                        value,
                    },
                    Some(i),
                ) => match updated.as_int_if_known() {
                    Some(j) if i == j => return Some(value.clone()),
                    Some(_) => return Some(Expr::index(base.clone(), index.clone())),
                    None => {}
                },
                _ => {}
            }
            push_into_conditional(array, |branch| {
                Expr::new(
                    Expression::Index {
                        array: branch.clone(),
                        index: index.clone(),
                    },
                    expr.expr_type.clone(),
                )
            })
        }
        Expression::Member { operand, field } => push_into_conditional(operand, |branch| {
            Expr::new(
                Expression::Member {
                    operand: branch.clone(),
                    field: field.clone(),
                },
                expr.expr_type.clone(),
            )
        }),
        Expression::Unary { operator, operand } => match (operator, &operand.expression) {
            (UnaryOperator::Not, Expression::CompileTimeConstant(ConstantValue::Bool(b))) => {
                Some(Expr::bool(!b))
            }
            (UnaryOperator::Not, Expression::CompileTimeConstant(ConstantValue::Int(i))) => {
                Some(Expr::bool(*i == 0))
            }
            (
                UnaryOperator::Not,
                Expression::Unary {
                    operator: UnaryOperator::Not,
                    operand: inner,
                },
            ) if inner.expr_type == ExpressionType::Bool => Some(inner.clone()),
            (UnaryOperator::Neg, Expression::CompileTimeConstant(ConstantValue::Int(i))) => Some(
                Expr::int(truncate(i.wrapping_neg(), &expr.expr_type), expr.expr_type.clone()),
            ),
            _ => None,
        },
        Expression::AddressOf { .. }
        | Expression::ArrayLiteral { .. }
        | Expression::CompileTimeConstant(..)
        | Expression::Dereference { .. }
        | Expression::Label(..)
        | Expression::PointerOffset { .. }
        | Expression::SameObject { .. }
        | Expression::StringConstant(..)
        | Expression::Symbol(..)
        | Expression::Update { .. } => None,
    }
}

/// op(c ? a : b) becomes c ? op(a) : op(b).
fn push_into_conditional<F>(operand: &Rc<Expr>, rebuild: F) -> Option<Rc<Expr>>
where
    F: Fn(&Rc<Expr>) -> Rc<Expr>,
{
    if let Expression::ConditionalExpression {
        condition,
        consequent,
        alternate,
    } = &operand.expression
    {
        Some(Expr::conditional(
            condition.clone(),
            rebuild(consequent),
            rebuild(alternate),
        ))
    } else {
        None
    }
}

fn rewrite_cast(expr: &Rc<Expr>, operand: &Rc<Expr>) -> Option<Rc<Expr>> {
    if operand.expr_type == expr.expr_type {
        return Some(operand.clone());
    }
    match &operand.expression {
        Expression::Cast { operand: inner }
            if expr.expr_type.is_pointer()
                && operand.expr_type.is_pointer()
                && inner.expr_type.is_pointer() =>
        {
            Some(Expr::cast(inner.clone(), expr.expr_type.clone()))
        }
        Expression::CompileTimeConstant(ConstantValue::Int(i)) if expr.expr_type.is_integer() => {
            Some(Expr::int(truncate(*i, &expr.expr_type), expr.expr_type.clone()))
        }
        Expression::CompileTimeConstant(ConstantValue::Int(i))
            if expr.expr_type == ExpressionType::Bool =>
        {
            Some(Expr::bool(*i != 0))
        }
        Expression::CompileTimeConstant(ConstantValue::Null) if expr.expr_type.is_pointer() => {
            Some(Expr::null(expr.expr_type.clone()))
        }
        _ => None,
    }
}

fn rewrite_binary(
    expr: &Rc<Expr>,
    operator: BinaryOperator,
    left: &Rc<Expr>,
    right: &Rc<Expr>,
) -> Option<Rc<Expr>> {
    let is_bool = |e: &Rc<Expr>| e.expr_type == ExpressionType::Bool;
    match operator {
        BinaryOperator::And | BinaryOperator::Or => {
            let absorbing = operator == BinaryOperator::Or;
            for (this, other) in [(left, right), (right, left)] {
                match this.as_bool_if_known() {
                    Some(b) if b == absorbing => return Some(Expr::bool(absorbing)),
                    Some(_) if is_bool(other) => return Some(other.clone()),
                    _ => {}
                }
            }
            if left == right && is_bool(left) {
                return Some(left.clone());
            }
            return None;
        }
        BinaryOperator::Equals | BinaryOperator::Ne => {
            if let Some(equal) = decide_equality(left, right) {
                let result = if operator == BinaryOperator::Equals {
                    equal
                } else {
                    !equal
                };
                return Some(Expr::bool(result));
            }
        }
        BinaryOperator::Add | BinaryOperator::Sub if expr.expr_type.is_pointer() => {
            if right.as_int_if_known() == Some(0) && left.expr_type == expr.expr_type {
                return Some(left.clone());
            }
            // (p + c1) + c2 becomes p + (c1 + c2)
            if let (
                Expression::Binary {
                    operator: BinaryOperator::Add,
                    left: base,
                    right: inner,
                },
                Some(c2),
            ) = (&left.expression, right.as_int_if_known())
            {
                if let Some(c1) = inner.as_int_if_known() {
                    let c2 = if operator == BinaryOperator::Sub {
                        c2.wrapping_neg()
                    } else {
                        c2
                    };
                    return Some(Expr::add(
                        base.clone(),
                        Expr::int(c1.wrapping_add(c2), inner.expr_type.clone()),
                    ));
                }
            }
            return None;
        }
        _ => {}
    }
    let (l, r) = (left.as_int_if_known()?, right.as_int_if_known()?);
    if !left.expr_type.is_integer() || !right.expr_type.is_integer() {
        return None;
    }
    let result = match operator {
        BinaryOperator::Add => l.wrapping_add(r),
        BinaryOperator::Sub => l.wrapping_sub(r),
        BinaryOperator::Mul => l.wrapping_mul(r),
        BinaryOperator::Div => l.checked_div(r)?,
        BinaryOperator::Rem => l.checked_rem(r)?,
        BinaryOperator::Equals => return Some(Expr::bool(l == r)),
        BinaryOperator::Ne => return Some(Expr::bool(l != r)),
        BinaryOperator::LessThan => return Some(Expr::bool(l < r)),
        BinaryOperator::LessOrEqual => return Some(Expr::bool(l <= r)),
        BinaryOperator::GreaterThan => return Some(Expr::bool(l > r)),
        BinaryOperator::GreaterOrEqual => return Some(Expr::bool(l >= r)),
        BinaryOperator::And | BinaryOperator::Or => return None,
    };
    Some(Expr::int(
        truncate(result, &expr.expr_type),
        expr.expr_type.clone(),
    ))
}

/// Decides the equality of two expressions when that does not depend on the state.
fn decide_equality(left: &Rc<Expr>, right: &Rc<Expr>) -> Option<bool> {
    if let (Some(l), Some(r)) = (left.as_bool_if_known(), right.as_bool_if_known()) {
        return Some(l == r);
    }
    match (&left.expression, &right.expression) {
        (Expression::AddressOf { object: a }, Expression::AddressOf { object: b }) => {
            match (&a.expression, &b.expression) {
                (Expression::Symbol(s1), Expression::Symbol(s2))
                    if !s1.is_field() && !s2.is_field() =>
                {
                    Some(s1.l1() == s2.l1())
                }
                _ => None,
            }
        }
        (Expression::AddressOf { .. }, Expression::CompileTimeConstant(ConstantValue::Null))
        | (Expression::CompileTimeConstant(ConstantValue::Null), Expression::AddressOf { .. }) => {
            Some(false)
        }
        (
            Expression::CompileTimeConstant(ConstantValue::Null),
            Expression::CompileTimeConstant(ConstantValue::Null),
        ) => Some(true),
        _ => None,
    }
}

fn truncate(value: i64, t: &ExpressionType) -> i64 {
    match t {
        ExpressionType::Char => value as i8 as i64,
        ExpressionType::Int => value as i32 as i64,
        _ => value,
    }
}
