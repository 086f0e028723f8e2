// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::{AssignmentKind, AutoObjectInitializer, Context};
use crate::errors::Result;
use crate::expression::{Expr, Expression, Symbol};
use crate::field_sensitivity;
use crate::path_state::PathState;
use crate::types::ExpressionType;

use std::rc::Rc;

/// The suffix of the name of the object that an input pointer initially points to.
pub const INPUT_OBJECT_SUFFIX: &str = "$auto_object";

/// The prefix of the names of the objects that pointers inside auto objects point to.
pub const AUTO_OBJECT_PREFIX: &str = "symex::auto_object";

pub fn is_auto_object(symbol: &Symbol) -> bool {
    symbol.name.ends_with(INPUT_OBJECT_SUFFIX) || symbol.name.starts_with(AUTO_OBJECT_PREFIX)
}

/// The object that an input pointer with the given name points to.
pub fn input_object(name: &str, pointee: &ExpressionType) -> Rc<Expr> {
    Expr::symbol(&format!("{}{}", name, INPUT_OBJECT_SUFFIX), pointee.clone())
}

/// Objects that inputs point to are created lazily. When one is first dereferenced, every pointer
/// it contains is made to point to a fresh auto object of its own, which in turn is initialized
/// when it is dereferenced.
#[derive(Debug, Default)]
pub struct AutoObjects {}

impl AutoObjectInitializer for AutoObjects {
    fn initialize_if_fresh(
        &self,
        ctx: &Context,
        state: &mut PathState,
        object: &Rc<Expr>,
    ) -> Result<()> {
        let mut roots = Vec::new();
        object.visit(&mut |e| {
            if let Expression::Symbol(symbol) = &e.expression {
                if is_auto_object(symbol) {
                    let root_type = symbol
                        .root_type
                        .clone()
                        .unwrap_or_else(|| e.expr_type.clone());
                    roots.push((symbol.root(), root_type));
                }
            }
        });
        for (root, root_type) in roots {
            let key = root.object_key();
            if state.is_auto_object_initialized(&key) {
                continue;
            }
            state.mark_auto_object_initialized(key);
            debug!("initializing auto object {}", root);
            let root_expr = Expr::from_symbol(root, root_type);
            for target in field_sensitivity::leaf_targets(&ctx.ns, &root_expr) {
                let pointee = match target.expr_type.pointee() {
                    Some(ExpressionType::Void) | None => continue,
                    Some(pointee) => pointee.clone(),
                };
                let fresh = Expr::symbol(&state.fresh_name(AUTO_OBJECT_PREFIX), pointee);
                let value = Expr::address_of(fresh);
                ctx.recorder.record(
                    ctx,
                    state,
                    &target,
                    &value,
                    &Expr::bool(true),
                    AssignmentKind::Hidden,
                )?;
            }
        }
        Ok(())
    }
}
