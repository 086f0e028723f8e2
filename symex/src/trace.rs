// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::{AssignmentKind, AssignmentRecorder, Context};
use crate::errors::Result;
use crate::expression::{Expr, Expression};
use crate::path_state::PathState;
use crate::types::ExpressionType;

use log_derive::logfn_inputs;
use std::rc::Rc;

/// Records assignments in the trace of a path. Assignments to struct variables are split into
/// one assignment per field, since fields are tracked as separate variables.
#[derive(Debug, Default)]
pub struct TraceRecorder {}

impl AssignmentRecorder for TraceRecorder {
    #[logfn_inputs(DEBUG)]
    fn record(
        &self,
        ctx: &Context,
        state: &mut PathState,
        target: &Rc<Expr>,
        value: &Rc<Expr>,
        guard: &Rc<Expr>,
        kind: AssignmentKind,
    ) -> Result<()> {
        if let ExpressionType::Struct(tag) = &target.expr_type {
            let fields = match ctx.ns.lookup(tag) {
                Some(struct_type) => struct_type.fields.clone(),
                None => vec![],
            };
            for field in fields {
                let member = |operand: &Rc<Expr>| {
                    Expr::new(
                        Expression::Member {
                            operand: operand.clone(),
                            field: field.name.clone(),
                        },
                        field.field_type.clone(),
                    )
                };
                let field_target = ctx.decompose(&member(target), true);
                let field_value = ctx.simplify(&ctx.decompose(&member(value), true));
                self.record(ctx, state, &field_target, &field_value, guard, kind)?;
            }
            return Ok(());
        }
        state.assign_symbol(ctx, target, value, guard, kind)
    }
}
