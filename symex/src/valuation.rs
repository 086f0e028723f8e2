// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Best effort constant propagation over level 2 expressions. Values of inputs are unknown,
//! and so is anything computed from them, which the executor handles by forking paths.

use crate::expression::{BinaryOperator, ConstantValue, Expr, Expression, UnaryOperator};
use crate::path_state::PathState;
use crate::types::{ExpressionType, TypeTable};

use serde::Serialize;
use std::rc::Rc;

#[derive(Serialize, Clone, Debug, Eq, PartialEq)]
pub enum ConcreteValue {
    Bool(bool),
    Int(i64),
    /// An address: the object key of the object pointed into, and a byte offset.
    Pointer { object: Rc<str>, offset: i64 },
    Null,
    /// Elements that are not known are None.
    Array(Rc<Vec<Option<ConcreteValue>>>),
}

impl ConcreteValue {
    /// The value of this as a condition, as in C.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConcreteValue::Bool(b) => Some(*b),
            ConcreteValue::Int(i) => Some(*i != 0),
            ConcreteValue::Pointer { .. } => Some(true),
            ConcreteValue::Null => Some(false),
            ConcreteValue::Array(..) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConcreteValue::Bool(b) => Some(*b as i64),
            ConcreteValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Evaluates the expression in the given state. Returns None if the value depends on something
/// that is not known.
pub fn evaluate(state: &PathState, ns: &TypeTable, expr: &Rc<Expr>) -> Option<ConcreteValue> {
    match &expr.expression {
        Expression::Symbol(symbol) => state.value_of(&symbol.to_string()).cloned(),
        Expression::CompileTimeConstant(ConstantValue::Bool(b)) => Some(ConcreteValue::Bool(*b)),
        Expression::CompileTimeConstant(ConstantValue::Int(i)) => {
            Some(ConcreteValue::Int(truncate(*i, &expr.expr_type)))
        }
        Expression::CompileTimeConstant(ConstantValue::Null) => Some(ConcreteValue::Null),
        Expression::AddressOf { object } => {
            let (object, offset) = address(state, ns, object)?;
            Some(ConcreteValue::Pointer { object, offset })
        }
        Expression::ArrayLiteral { elements } => Some(ConcreteValue::Array(Rc::new(
            elements.iter().map(|e| evaluate(state, ns, e)).collect(),
        ))),
        Expression::Binary {
            operator,
            left,
            right,
        } => evaluate_binary(state, ns, *operator, left, right, &expr.expr_type),
        Expression::ByteExtract { operand, offset } => {
            let element_type = operand.expr_type.element()?;
            if *element_type != expr.expr_type {
                return None;
            }
            let size = ns.size_of(element_type)? as i64;
            let offset = evaluate(state, ns, offset)?.as_int()?;
            if size == 0 || offset % size != 0 {
                return None;
            }
            element_at(&evaluate(state, ns, operand)?, offset / size)
        }
        Expression::Cast { operand } => cast(evaluate(state, ns, operand)?, &expr.expr_type),
        Expression::ConditionalExpression {
            condition,
            consequent,
            alternate,
        } => {
            if evaluate(state, ns, condition)?.as_bool()? {
                evaluate(state, ns, consequent)
            } else {
                evaluate(state, ns, alternate)
            }
        }
        Expression::Index { array, index } => {
            let index = evaluate(state, ns, index)?.as_int()?;
            element_at(&evaluate(state, ns, array)?, index)
        }
        Expression::PointerOffset { pointer } => match evaluate(state, ns, pointer)? {
            ConcreteValue::Pointer { offset, .. } => Some(ConcreteValue::Int(offset)),
            ConcreteValue::Null => Some(ConcreteValue::Int(0)),
            _ => None,
        },
        Expression::SameObject { left, right } => {
            match (evaluate(state, ns, left)?, evaluate(state, ns, right)?) {
                (
                    ConcreteValue::Pointer { object: o1, .. },
                    ConcreteValue::Pointer { object: o2, .. },
                ) => Some(ConcreteValue::Bool(o1 == o2)),
                (ConcreteValue::Null, ConcreteValue::Null) => Some(ConcreteValue::Bool(true)),
                (ConcreteValue::Null, ConcreteValue::Pointer { .. })
                | (ConcreteValue::Pointer { .. }, ConcreteValue::Null) => {
                    Some(ConcreteValue::Bool(false))
                }
                _ => None,
            }
        }
        Expression::Unary { operator, operand } => {
            let value = evaluate(state, ns, operand)?;
            match operator {
                UnaryOperator::Not => Some(ConcreteValue::Bool(!value.as_bool()?)),
                UnaryOperator::Neg => Some(ConcreteValue::Int(truncate(
                    value.as_int()?.wrapping_neg(),
                    &expr.expr_type,
                ))),
            }
        }
        Expression::Update {
            array,
            index,
            value,
        } => {
            let mut elements = match evaluate(state, ns, array) {
                Some(ConcreteValue::Array(elements)) => elements.as_ref().clone(),
                _ => match &array.expr_type {
                    ExpressionType::Array { length, .. } => vec![None; *length as usize],
                    _ => return None,
                },
            };
            let index = evaluate(state, ns, index)?.as_int()?;
            if index < 0 || index as usize >= elements.len() {
                return None;
            }
            elements[index as usize] = evaluate(state, ns, value);
            Some(ConcreteValue::Array(Rc::new(elements)))
        }
        Expression::Dereference { .. }
        | Expression::Label(..)
        | Expression::Member { .. }
        | Expression::StringConstant(..) => None,
    }
}

fn element_at(array: &ConcreteValue, index: i64) -> Option<ConcreteValue> {
    if let ConcreteValue::Array(elements) = array {
        if index >= 0 {
            return elements.get(index as usize).cloned().flatten();
        }
    }
    None
}

/// The object key and byte offset of the object denoted by the lvalue.
fn address(state: &PathState, ns: &TypeTable, lvalue: &Rc<Expr>) -> Option<(Rc<str>, i64)> {
    match &lvalue.expression {
        Expression::Symbol(symbol) => {
            Some((symbol.object_key(), symbol.intrinsic_offset(ns)? as i64))
        }
        Expression::Member { operand, field } => {
            let tag = match &operand.expr_type {
                ExpressionType::Struct(tag) => tag,
                _ => return None,
            };
            let (object, offset) = address(state, ns, operand)?;
            offset.checked_add(ns.field_offset(tag, field)? as i64).map(|o| (object, o))
        }
        Expression::Index { array, index } => {
            let (object, offset) = address(state, ns, array)?;
            let size = ns.size_of(&lvalue.expr_type)? as i64;
            let index = evaluate(state, ns, index)?.as_int()?;
            let offset = offset.checked_add(index.checked_mul(size)?)?;
            Some((object, offset))
        }
        Expression::ByteExtract { operand, offset: extra } => {
            let (object, offset) = address(state, ns, operand)?;
            let offset = offset.checked_add(evaluate(state, ns, extra)?.as_int()?)?;
            Some((object, offset))
        }
        Expression::Cast { operand } => address(state, ns, operand),
        Expression::ConditionalExpression {
            condition,
            consequent,
            alternate,
        } => {
            if evaluate(state, ns, condition)?.as_bool()? {
                address(state, ns, consequent)
            } else {
                address(state, ns, alternate)
            }
        }
        Expression::Dereference { pointer } => match evaluate(state, ns, pointer)? {
            ConcreteValue::Pointer { object, offset } => Some((object, offset)),
            _ => None,
        },
        Expression::StringConstant(..) | Expression::ArrayLiteral { .. } => {
            Some((Rc::from(lvalue.to_string().as_str()), 0))
        }
        _ => None,
    }
}

fn cast(value: ConcreteValue, target_type: &ExpressionType) -> Option<ConcreteValue> {
    match target_type {
        ExpressionType::Bool => Some(ConcreteValue::Bool(value.as_bool()?)),
        ExpressionType::Char | ExpressionType::Int | ExpressionType::Long => {
            Some(ConcreteValue::Int(truncate(value.as_int()?, target_type)))
        }
        ExpressionType::Pointer(..) => match value {
            ConcreteValue::Int(0) => Some(ConcreteValue::Null),
            ConcreteValue::Pointer { .. } | ConcreteValue::Null => Some(value),
            _ => None,
        },
        _ => Some(value),
    }
}

fn evaluate_binary(
    state: &PathState,
    ns: &TypeTable,
    operator: BinaryOperator,
    left: &Rc<Expr>,
    right: &Rc<Expr>,
    result_type: &ExpressionType,
) -> Option<ConcreteValue> {
    // The logical operators are evaluated lazily, and are known if either side decides them.
    match operator {
        BinaryOperator::And | BinaryOperator::Or => {
            let decisive = operator == BinaryOperator::Or;
            let l = evaluate(state, ns, left).and_then(|v| v.as_bool());
            if l == Some(decisive) {
                return Some(ConcreteValue::Bool(decisive));
            }
            let r = evaluate(state, ns, right).and_then(|v| v.as_bool());
            if r == Some(decisive) {
                return Some(ConcreteValue::Bool(decisive));
            }
            return match (l, r) {
                (Some(_), Some(_)) => Some(ConcreteValue::Bool(!decisive)),
                _ => None,
            };
        }
        _ => {}
    }
    let l = evaluate(state, ns, left)?;
    let r = evaluate(state, ns, right)?;
    match (l, r) {
        (ConcreteValue::Pointer { object, offset }, ConcreteValue::Int(i))
            if matches!(operator, BinaryOperator::Add | BinaryOperator::Sub) =>
        {
            let size = ns.size_of(left.expr_type.pointee()?)? as i64;
            let delta = if operator == BinaryOperator::Add {
                i.checked_mul(size)?
            } else {
                i.checked_neg()?.checked_mul(size)?
            };
            Some(ConcreteValue::Pointer {
                object,
                offset: offset.checked_add(delta)?,
            })
        }
        (ConcreteValue::Int(i), ConcreteValue::Pointer { object, offset })
            if operator == BinaryOperator::Add =>
        {
            let size = ns.size_of(right.expr_type.pointee()?)? as i64;
            Some(ConcreteValue::Pointer {
                object,
                offset: offset.checked_add(i.checked_mul(size)?)?,
            })
        }
        (
            ConcreteValue::Pointer {
                object: o1,
                offset: off1,
            },
            ConcreteValue::Pointer {
                object: o2,
                offset: off2,
            },
        ) => match operator {
            BinaryOperator::Equals => Some(ConcreteValue::Bool(o1 == o2 && off1 == off2)),
            BinaryOperator::Ne => Some(ConcreteValue::Bool(o1 != o2 || off1 != off2)),
            _ if o1 != o2 => None,
            BinaryOperator::Sub => {
                let size = ns.size_of(left.expr_type.pointee()?)? as i64;
                if size == 0 {
                    return None;
                }
                Some(ConcreteValue::Int(off1.checked_sub(off2)? / size))
            }
            _ => compare(operator, off1, off2),
        },
        (ConcreteValue::Null, ConcreteValue::Null) => match operator {
            BinaryOperator::Equals => Some(ConcreteValue::Bool(true)),
            BinaryOperator::Ne => Some(ConcreteValue::Bool(false)),
            _ => None,
        },
        (ConcreteValue::Null, ConcreteValue::Pointer { .. })
        | (ConcreteValue::Pointer { .. }, ConcreteValue::Null) => match operator {
            BinaryOperator::Equals => Some(ConcreteValue::Bool(false)),
            BinaryOperator::Ne => Some(ConcreteValue::Bool(true)),
            _ => None,
        },
        (l, r) => {
            let l = l.as_int()?;
            let r = r.as_int()?;
            let result = match operator {
                BinaryOperator::Add => l.wrapping_add(r),
                BinaryOperator::Sub => l.wrapping_sub(r),
                BinaryOperator::Mul => l.wrapping_mul(r),
                BinaryOperator::Div => l.checked_div(r)?,
                BinaryOperator::Rem => l.checked_rem(r)?,
                _ => return compare(operator, l, r),
            };
            Some(ConcreteValue::Int(truncate(result, result_type)))
        }
    }
}

fn compare(operator: BinaryOperator, l: i64, r: i64) -> Option<ConcreteValue> {
    let result = match operator {
        BinaryOperator::Equals => l == r,
        BinaryOperator::Ne => l != r,
        BinaryOperator::LessThan => l < r,
        BinaryOperator::LessOrEqual => l <= r,
        BinaryOperator::GreaterThan => l > r,
        BinaryOperator::GreaterOrEqual => l >= r,
        _ => return None,
    };
    Some(ConcreteValue::Bool(result))
}

/// Wraps the value around to the width of the given integer type.
fn truncate(value: i64, t: &ExpressionType) -> i64 {
    match t {
        ExpressionType::Bool => (value != 0) as i64,
        ExpressionType::Char => value as i8 as i64,
        ExpressionType::Int => value as i32 as i64,
        _ => value,
    }
}
