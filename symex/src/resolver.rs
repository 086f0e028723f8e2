// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The entry point of dereference resolution. An expression is first normalized so that the
//! pointers it dereferences are renamed and decomposed, then every dereference that is read
//! rather than written is replaced by a symbol that caches its resolution, and finally the
//! remaining dereferences are rewritten into the objects their pointers may point to.

use crate::collaborators::{AssignmentKind, Context, RenameLevel};
use crate::dereference::Dereferencer;
use crate::errors::{Result, SymexError};
use crate::expression::{Expr, Expression};
use crate::path_state::PathState;

use itertools::Itertools;
use log_derive::logfn_inputs;
use std::rc::Rc;

/// The prefix of the names of the symbols that hold cached dereferences.
pub const CACHED_DEREFERENCE_PREFIX: &str = "symex_dereference::cached_dereference$";

/// Returns an expression that is equivalent to expr on the current path and contains no
/// dereferences, renamed to level 1 and decomposed into field symbols. If write is true, expr
/// is the target of an assignment and the result is an lvalue.
#[logfn_inputs(DEBUG)]
pub fn resolve(
    ctx: &Context,
    state: &mut PathState,
    expr: &Rc<Expr>,
    write: bool,
) -> Result<Rc<Expr>> {
    let expr = normalize_dereferenced_pointers(ctx, state, expr);
    let expr = if ctx.options.dereference_cache {
        cache_rec(ctx, state, &expr, write)?
    } else {
        expr
    };
    let expr = Dereferencer::new(ctx, state).dereference_rec(&expr, write)?;
    let expr = ctx.rename(state, &expr, RenameLevel::L1);
    let expr = ctx.simplify(&expr);
    if ctx.options.run_validation_checks && expr.contains_dereference() {
        return Err(SymexError::InvariantViolation(format!(
            "simplification re-introduced a dereference into {}",
            expr
        )));
    }
    let expr = ctx.decompose(&expr, write);
    if expr.contains_dereference() {
        return Err(SymexError::InvariantViolation(format!(
            "a dereference survived resolution: {}",
            expr
        )));
    }
    Ok(expr)
}

/// Renames the pointer of every outermost dereference to level 1 and decomposes it, so that
/// equal pointers become syntactically equal.
fn normalize_dereferenced_pointers(
    ctx: &Context,
    state: &PathState,
    expr: &Rc<Expr>,
) -> Rc<Expr> {
    match &expr.expression {
        Expression::Dereference { pointer } => {
            let renamed = ctx.rename(state, pointer, RenameLevel::L1);
            let pointer = ctx.decompose(&renamed, false);
            Expr::new(Expression::Dereference { pointer }, expr.expr_type.clone())
        }
        _ => expr.map_children(|child| normalize_dereferenced_pointers(ctx, state, child)),
    }
}

/// Replaces each dereference that is read by a symbol that is assigned its resolution, reusing
/// the symbol of an earlier equal dereference when no object it depends on has been written
/// since. Dereferences on the spine of an lvalue are left alone.
fn cache_rec(
    ctx: &Context,
    state: &mut PathState,
    expr: &Rc<Expr>,
    on_spine: bool,
) -> Result<Rc<Expr>> {
    if let Expression::Dereference { pointer } = &expr.expression {
        let cached_pointer = cache_rec(ctx, state, pointer, false)?;
        let dereference = if Rc::ptr_eq(&cached_pointer, pointer) {
            expr.clone()
        } else {
            Expr::new(
                Expression::Dereference {
                    pointer: cached_pointer,
                },
                expr.expr_type.clone(),
            )
        };
        if on_spine {
            return Ok(dereference);
        }
        return cached_dereference(ctx, state, &dereference);
    }
    let mut position = 0;
    expr.try_map_children(|child| {
        let child_on_spine = child_is_on_spine(expr, position, on_spine);
        position += 1;
        cache_rec(ctx, state, child, child_on_spine)
    })
}

/// True if the child at the given position of parent denotes (part of) the same object as
/// parent does. The object of an address-of expression is always an lvalue.
fn child_is_on_spine(parent: &Expr, position: usize, parent_on_spine: bool) -> bool {
    match &parent.expression {
        Expression::AddressOf { .. } => true,
        Expression::Member { .. } | Expression::Cast { .. } => parent_on_spine,
        Expression::ByteExtract { .. } => position == 0 && parent_on_spine,
        Expression::Index { array, .. } => {
            // A flexible array member is indexed past the end of the struct that holds it, so a
            // cached copy of the struct would not do.
            let flexible = matches!(array.expression, Expression::Member { .. })
                && array.expr_type.is_zero_length_array();
            position == 0 && (parent_on_spine || flexible)
        }
        Expression::ConditionalExpression { .. } => position > 0 && parent_on_spine,
        _ => false,
    }
}

fn cached_dereference(
    ctx: &Context,
    state: &mut PathState,
    dereference: &Rc<Expr>,
) -> Result<Rc<Expr>> {
    let pointer = match &dereference.expression {
        Expression::Dereference { pointer } => pointer,
        _ => {
            return Err(SymexError::InvariantViolation(format!(
                "{} is not a dereference",
                dereference
            )))
        }
    };
    let key_pointer = ctx.rename(state, &ctx.decompose(pointer, false), RenameLevel::L2);
    let key = Expr::new(
        Expression::Dereference {
            pointer: key_pointer,
        },
        dereference.expr_type.clone(),
    );
    if let Some(symbol) = state.cache.lookup(&key) {
        trace!("{} is cached as {}", key, symbol);
        return Ok(symbol);
    }

    let value = Dereferencer::new(ctx, state).dereference_rec(dereference, false)?;
    let value = ctx.rename(state, &value, RenameLevel::L1);
    let value = ctx.simplify(&value);
    let value = ctx.decompose(&value, false);

    let name = state.fresh_name(CACHED_DEREFERENCE_PREFIX);
    let symbol = Expr::symbol(&name, dereference.expr_type.clone());
    ctx.recorder.record(
        ctx,
        state,
        &symbol,
        &value,
        &Expr::bool(true),
        AssignmentKind::Hidden,
    )?;

    let touched = key
        .symbols()
        .into_iter()
        .chain(value.symbols())
        .map(|s| s.object_key())
        .unique()
        .collect();
    debug!("caching {} as {}", key, symbol);
    state.cache.add(key, symbol.clone(), touched);
    Ok(symbol)
}
