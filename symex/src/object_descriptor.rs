// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{Result, SymexError};
use crate::expression::{BinaryOperator, Expr, Expression};
use crate::types::{ExpressionType, TypeTable};

use log_derive::logfn_inputs;
use std::rc::Rc;

/// An lvalue in canonical form: the bytes of root, starting at offset, read as a value of type
/// target_type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectDescriptor {
    pub root: Rc<Expr>,
    pub offset: Rc<Expr>,
    pub target_type: ExpressionType,
}

impl ObjectDescriptor {
    /// Strips member accesses, array indexing, byte extracts and casts off the lvalue, adding up
    /// the byte offsets they select, until an expression of some other kind is reached.
    /// The offset is not simplified. Indexing anything other than an array is unsupported.
    #[logfn_inputs(TRACE)]
    pub fn build(ns: &TypeTable, lvalue: &Rc<Expr>) -> Result<ObjectDescriptor> {
        let mut terms: Vec<Rc<Expr>> = Vec::new();
        let mut current = lvalue.clone();
        loop {
            let next = match &current.expression {
                Expression::Member { operand, field } => {
                    let offset = match &operand.expr_type {
                        ExpressionType::Struct(tag) => ns.field_offset(tag, field),
                        _ => None,
                    };
                    match offset {
                        Some(offset) => terms.push(Expr::offset(offset as i64)),
                        None => return Err(SymexError::unsupported("member", current.as_ref())),
                    }
                    operand.clone()
                }
                Expression::Index { array, .. } if array.expr_type.is_pointer() => {
                    return Err(SymexError::unsupported(
                        "index into a pointer",
                        current.as_ref(),
                    ));
                }
                Expression::Index { array, index } if array.expr_type.is_array() => {
                    let size = match ns.size_of(&current.expr_type) {
                        Some(size) => size as i64,
                        None => return Err(SymexError::unsupported("index", current.as_ref())),
                    };
                    let index = if index.expr_type == ExpressionType::index_type() {
                        index.clone()
                    } else {
                        Expr::cast(index.clone(), ExpressionType::index_type())
                    };
                    terms.push(Expr::binary(BinaryOperator::Mul, index, Expr::offset(size)));
                    array.clone()
                }
                Expression::ByteExtract { operand, offset } => {
                    terms.push(offset.clone());
                    operand.clone()
                }
                Expression::Cast { operand } if !current.expr_type.is_pointer() => operand.clone(),
                Expression::Index { .. } => {
                    return Err(SymexError::unsupported("index", current.as_ref()))
                }
                _ => break,
            };
            current = next;
        }
        // The terms were collected outside in, the offset reads better inside out.
        let offset = terms
            .into_iter()
            .rev()
            .reduce(Expr::add)
            .unwrap_or_else(|| Expr::offset(0));
        Ok(ObjectDescriptor {
            root: current,
            offset,
            target_type: lvalue.expr_type.clone(),
        })
    }

    /// The descriptor as a byte extract expression.
    pub fn as_byte_extract(&self) -> Rc<Expr> {
        Expr::byte_extract(
            self.root.clone(),
            self.offset.clone(),
            self.target_type.clone(),
        )
    }
}
