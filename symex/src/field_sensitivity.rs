// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::FieldDecomposer;
use crate::expression::{Expr, Expression, Symbol};
use crate::types::{ExpressionType, TypeTable};

use log_derive::logfn_inputs;
use std::rc::Rc;

/// Field sensitivity: the fields of struct variables are tracked as variables of their own.
/// `s.f` becomes the symbol `s..f`, and a byte extract at a constant offset of a struct variable
/// becomes the symbol of the field found at that offset, if it has the extracted type.
///
/// When decomposing a write target, member accesses and byte extracts of conditionals are
/// pushed into the branches, so that `(c ? s1 : s2).f` becomes `c ? s1..f : s2..f` and each
/// branch can be assigned on its own.
#[derive(Debug, Default)]
pub struct FieldSensitivity {}

impl FieldDecomposer for FieldSensitivity {
    #[logfn_inputs(TRACE)]
    fn decompose(&self, ns: &TypeTable, expr: &Rc<Expr>, write: bool) -> Rc<Expr> {
        decompose(ns, expr, write)
    }
}

fn decompose(ns: &TypeTable, expr: &Rc<Expr>, write: bool) -> Rc<Expr> {
    match &expr.expression {
        Expression::Member { operand, field } => {
            let operand = decompose(ns, operand, write);
            match &operand.expression {
                Expression::Symbol(symbol) if operand.expr_type.is_struct() => Expr::from_symbol(
                    symbol.field(&operand.expr_type, field),
                    expr.expr_type.clone(),
                ),
                Expression::ConditionalExpression {
                    condition,
                    consequent,
                    alternate,
                } if write => {
                    let member = |branch: &Rc<Expr>| {
                        decompose(
                            ns,
                            &Expr::new(
                                Expression::Member {
                                    operand: branch.clone(),
                                    field: field.clone(),
                                },
                                expr.expr_type.clone(),
                            ),
                            write,
                        )
                    };
                    Expr::conditional(condition.clone(), member(consequent), member(alternate))
                }
                _ => Expr::new(
                    Expression::Member {
                        operand: operand.clone(),
                        field: field.clone(),
                    },
                    expr.expr_type.clone(),
                ),
            }
        }
        Expression::ByteExtract { operand, offset } => {
            let operand = decompose(ns, operand, write);
            let offset = decompose(ns, offset, false);
            match &operand.expression {
                Expression::Symbol(symbol) => {
                    if let Some(component) = component_symbol(ns, symbol, &operand, &offset, expr) {
                        return component;
                    }
                }
                Expression::ConditionalExpression {
                    condition,
                    consequent,
                    alternate,
                } if write => {
                    let extract = |branch: &Rc<Expr>| {
                        decompose(
                            ns,
                            &Expr::byte_extract(
                                branch.clone(),
                                offset.clone(),
                                expr.expr_type.clone(),
                            ),
                            write,
                        )
                    };
                    return Expr::conditional(
                        condition.clone(),
                        extract(consequent),
                        extract(alternate),
                    );
                }
                _ => {}
            }
            Expr::byte_extract(operand, offset, expr.expr_type.clone())
        }
        Expression::Index { array, index } => {
            let array = decompose(ns, array, write);
            let index = decompose(ns, index, false);
            if let Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            } = &array.expression
            {
                if write {
                    let element = |branch: &Rc<Expr>| {
                        decompose(ns, &Expr::index(branch.clone(), index.clone()), write)
                    };
                    return Expr::conditional(
                        condition.clone(),
                        element(consequent),
                        element(alternate),
                    );
                }
            }
            Expr::new(Expression::Index { array, index }, expr.expr_type.clone())
        }
        Expression::Cast { operand } => Expr::new(
            Expression::Cast {
                operand: decompose(ns, operand, write),
            },
            expr.expr_type.clone(),
        ),
        Expression::ConditionalExpression {
            condition,
            consequent,
            alternate,
        } => Expr::conditional(
            decompose(ns, condition, false),
            decompose(ns, consequent, write),
            decompose(ns, alternate, write),
        ),
        _ => expr.map_children(|c| decompose(ns, c, false)),
    }
}

/// The symbol for the component of the struct symbol that a byte extract at a constant offset
/// selects, if there is one of the right type.
fn component_symbol(
    ns: &TypeTable,
    symbol: &Symbol,
    operand: &Rc<Expr>,
    offset: &Rc<Expr>,
    extract: &Rc<Expr>,
) -> Option<Rc<Expr>> {
    let offset = u64::try_from(offset.as_int_if_known()?).ok()?;
    let path = ns.component_at(&operand.expr_type, offset, &extract.expr_type)?;
    if path.is_empty() {
        return Some(operand.clone());
    }
    let mut component = symbol.clone();
    let mut component_type = operand.expr_type.clone();
    for field in path.iter() {
        let parent_type = component_type.clone();
        component_type = match &parent_type {
            ExpressionType::Struct(tag) => ns.field_type(tag, field)?,
            _ => return None,
        };
        component = component.field(&parent_type, field);
    }
    Some(Expr::from_symbol(component, extract.expr_type.clone()))
}

/// The decomposed symbols of the non-struct components of a variable, or the variable itself if
/// it is not a struct.
pub fn leaf_targets(ns: &TypeTable, root: &Rc<Expr>) -> Vec<Rc<Expr>> {
    ns.leaves(&root.expr_type)
        .into_iter()
        .map(|(path, _)| {
            let member = path.iter().fold(root.clone(), |operand, field| {
                let field_type = match &operand.expr_type {
                    ExpressionType::Struct(tag) => ns.field_type(tag, field),
                    _ => None,
                };
                Expr::new(
                    Expression::Member {
                        operand,
                        field: field.clone(),
                    },
                    field_type.unwrap_or(ExpressionType::Void),
                )
            });
            decompose(ns, &member, true)
        })
        .collect()
}
