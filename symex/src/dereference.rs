// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::{Context, RenameLevel};
use crate::errors::{Result, SymexError};
use crate::expression::{Expr, Expression};
use crate::path_state::PathState;
use crate::points_to;
use crate::types::ExpressionType;

use log_derive::logfn_inputs;
use std::rc::Rc;

/// Rewrites an expression into an equivalent one without dereferences, using the points-to
/// oracle of the context and the state of the current path.
#[derive(Debug)]
pub struct Dereferencer<'a> {
    pub(crate) ctx: &'a Context,
    pub(crate) state: &'a mut PathState,
}

impl<'a> Dereferencer<'a> {
    pub fn new(ctx: &'a Context, state: &'a mut PathState) -> Dereferencer<'a> {
        Dereferencer { ctx, state }
    }

    /// Replaces every dereference in expr by the objects its pointer may point to.
    /// Write is true if expr is the target of an assignment.
    #[logfn_inputs(TRACE)]
    pub fn dereference_rec(&mut self, expr: &Rc<Expr>, write: bool) -> Result<Rc<Expr>> {
        match &expr.expression {
            Expression::Dereference { pointer } => self.dereference_pointer(expr, pointer),
            Expression::Index { array, index } => {
                if let Expression::Member { .. } = &array.expression {
                    if array.expr_type.is_zero_length_array() {
                        // s.a[i], with a a flexible array member, is *(&s.a + i)
                        let element_pointer = ExpressionType::pointer_to(expr.expr_type.clone());
                        let address = Expr::new(
                            Expression::AddressOf {
                                object: array.clone(),
                            },
                            element_pointer,
                        );
                        let rewritten = Expr::dereference(Expr::add(address, index.clone()));
                        return self.dereference_rec(&rewritten, write);
                    }
                }
                if array.expr_type.is_pointer() {
                    return Err(SymexError::unsupported("index into a pointer", expr.as_ref()));
                }
                expr.try_map_children(|child| self.dereference_rec(child, write))
            }
            Expression::AddressOf { object } => {
                let keep_array = expr
                    .expr_type
                    .pointee()
                    .map(|t| t.is_array())
                    .unwrap_or(false);
                self.address_arithmetic(object, keep_array)
            }
            Expression::Cast { operand } => {
                // (T *)&a, with a of type T[n], is &a[0]
                if let Expression::AddressOf { object } = &operand.expression {
                    if let Some(element) = object.expr_type.element() {
                        if expr.expr_type == ExpressionType::pointer_to(element.clone()) {
                            let first = Expr::address_of(Expr::index(object.clone(), Expr::offset(0)));
                            return self.dereference_rec(&first, write);
                        }
                    }
                }
                expr.try_map_children(|child| self.dereference_rec(child, write))
            }
            _ => expr.try_map_children(|child| self.dereference_rec(child, write)),
        }
    }

    fn dereference_pointer(
        &mut self,
        dereference: &Rc<Expr>,
        pointer: &Rc<Expr>,
    ) -> Result<Rc<Expr>> {
        let is_safe = self.is_always_valid(dereference);

        // The pointer may itself contain dereferences.
        let pointer = self.dereference_rec(pointer, false)?;

        // The oracle keys value sets by level 1 names of decomposed symbols.
        let pointer = self.ctx.rename(self.state, &pointer, RenameLevel::L1);
        let pointer = self.ctx.simplify(&pointer);
        if self.ctx.options.run_validation_checks && pointer.contains_dereference() {
            return Err(SymexError::InvariantViolation(format!(
                "simplification re-introduced a dereference into {}",
                pointer
            )));
        }
        let pointer = self.ctx.decompose(&pointer, false);

        let alternatives =
            self.ctx
                .points_to
                .resolve_pointer(&self.ctx.ns, self.state, &pointer, is_safe)?;
        if alternatives.is_empty() {
            return Err(SymexError::EmptyPointsToSet(pointer.to_string()));
        }
        if self.ctx.options.show_points_to_sets {
            info!(
                "points-to set of {}: {{{}}}",
                pointer,
                alternatives
                    .iter()
                    .map(|a| a.object.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        let result = points_to::combine(&alternatives)?;
        self.state.dereference_resolutions += 1;

        // The result may refer to an object that an input points to, seen here for the first time.
        self.ctx
            .auto_objects
            .initialize_if_fresh(self.ctx, self.state, &result)?;
        Ok(result)
    }

    /// Asks the safety oracle about the dereference. Only single threaded code inside a known
    /// function is analyzed.
    fn is_always_valid(&self, dereference: &Rc<Expr>) -> bool {
        if self.state.active_threads != 1 || self.state.function_id.is_empty() {
            return false;
        }
        self.ctx.safety.is_always_valid(
            &dereference.l0(),
            &self.state.function_id,
            self.state.program_point,
        )
    }
}
