// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::{RenameLevel, Renamer};
use crate::expression::{Expr, Expression, Symbol};
use crate::path_state::PathState;

use log_derive::logfn;
use std::rc::Rc;

/// Static single assignment renaming. Level 1 qualifies locals with the current frame, level 2
/// additionally qualifies every symbol with its current version. Symbols that already carry a
/// frame or a version keep them, which makes renaming idempotent.
#[derive(Debug, Default)]
pub struct SsaRenamer {}

impl Renamer for SsaRenamer {
    #[logfn(TRACE)]
    fn rename(&self, state: &PathState, expr: &Rc<Expr>, level: RenameLevel) -> Rc<Expr> {
        rename_value(state, expr, level)
    }
}

fn rename_symbol(state: &PathState, symbol: &Symbol, level: RenameLevel) -> Option<Symbol> {
    let mut result = symbol.clone();
    if result.frame.is_none() && state.is_local(&symbol.name) {
        result.frame = Some(state.frame);
    }
    if level == RenameLevel::L2 && result.version.is_none() {
        result.version = Some(state.current_version(&result.l1_key()));
    }
    if result == *symbol {
        None
    } else {
        Some(result)
    }
}

fn rename_value(state: &PathState, expr: &Rc<Expr>, level: RenameLevel) -> Rc<Expr> {
    match &expr.expression {
        Expression::Symbol(symbol) => match rename_symbol(state, symbol, level) {
            Some(renamed) => Expr::from_symbol(renamed, expr.expr_type.clone()),
            None => expr.clone(),
        },
        Expression::AddressOf { object } => {
            let object = rename_address(state, object, level);
            Expr::new(Expression::AddressOf { object }, expr.expr_type.clone())
        }
        _ => expr.map_children(|c| rename_value(state, c, level)),
    }
}

/// Renames an expression that denotes an object rather than a value. The object itself is only
/// renamed to level 1, since its address does not change when it is assigned, but values used
/// to select a part of it are renamed to the requested level.
fn rename_address(state: &PathState, expr: &Rc<Expr>, level: RenameLevel) -> Rc<Expr> {
    match &expr.expression {
        Expression::Symbol(symbol) => match rename_symbol(state, symbol, RenameLevel::L1) {
            Some(renamed) => Expr::from_symbol(renamed, expr.expr_type.clone()),
            None => expr.clone(),
        },
        Expression::Index { array, index } => Expr::new(
            Expression::Index {
                array: rename_address(state, array, level),
                index: rename_value(state, index, level),
            },
            expr.expr_type.clone(),
        ),
        Expression::Member { operand, field } => Expr::new(
            Expression::Member {
                operand: rename_address(state, operand, level),
                field: field.clone(),
            },
            expr.expr_type.clone(),
        ),
        Expression::ByteExtract { operand, offset } => Expr::new(
            Expression::ByteExtract {
                operand: rename_address(state, operand, level),
                offset: rename_value(state, offset, level),
            },
            expr.expr_type.clone(),
        ),
        Expression::Cast { operand } => Expr::new(
            Expression::Cast {
                operand: rename_address(state, operand, level),
            },
            expr.expr_type.clone(),
        ),
        Expression::ConditionalExpression {
            condition,
            consequent,
            alternate,
        } => Expr::new(
            Expression::ConditionalExpression {
                condition: rename_value(state, condition, level),
                consequent: rename_address(state, consequent, level),
                alternate: rename_address(state, alternate, level),
            },
            expr.expr_type.clone(),
        ),
        _ => rename_value(state, expr, level),
    }
}
