// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::dereference::Dereferencer;
use crate::errors::{Result, SymexError};
use crate::expression::{Expr, Expression};
use crate::object_descriptor::ObjectDescriptor;
use crate::types::ExpressionType;

use log_derive::logfn_inputs;
use mirai_annotations::*;
use std::rc::Rc;

impl Dereferencer<'_> {
    /// Computes the address of the lvalue in the form `(T *)((char *)&root + offset)`, resolving
    /// any dereferences that are needed to compute the offset. If the lvalue is an array and
    /// keep_array is false, the result points to its first element instead of the whole array.
    #[logfn_inputs(TRACE)]
    pub fn address_arithmetic(&mut self, lvalue: &Rc<Expr>, keep_array: bool) -> Result<Rc<Expr>> {
        let result = match &lvalue.expression {
            Expression::ByteExtract { operand, offset } => {
                // &byte_extract(op, offset, T) is (T *)((char *)&op + offset)
                let mut base = self.address_arithmetic(operand, keep_array)?;
                if operand.expr_type.is_array() {
                    base = self.descend_to_element(base, &lvalue.expr_type);
                }
                let base = Expr::cast(base, ExpressionType::char_pointer());
                let offset = self.dereference_rec(offset, false)?;
                let address = Expr::add(base, offset);
                Expr::cast(address, pointer_to_decayed(&lvalue.expr_type, keep_array))
            }
            Expression::Index { array, .. } if array.expr_type.is_pointer() => {
                return Err(SymexError::unsupported("index into a pointer", lvalue.as_ref()));
            }
            Expression::Index { .. } | Expression::Member { .. } => {
                // The descriptor strips at least the outermost index or member.
                let descriptor = ObjectDescriptor::build(&self.ctx.ns, lvalue)?;
                let address = self.address_arithmetic(&descriptor.as_byte_extract(), keep_array)?;
                self.ctx.simplify(&address)
            }
            Expression::Dereference { pointer } => {
                // &*p is p, no matter what p is
                self.dereference_rec(pointer, false)?
            }
            Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            } => {
                // The condition is a value, not an address.
                let condition = self.dereference_rec(condition, false)?;
                let consequent = self.address_arithmetic(consequent, keep_array)?;
                let alternate = self.address_arithmetic(alternate, keep_array)?;
                Expr::conditional(condition, consequent, alternate)
            }
            Expression::Symbol(..)
            | Expression::StringConstant(..)
            | Expression::Label(..)
            | Expression::ArrayLiteral { .. } => self.address_of_object(lvalue, keep_array)?,
            Expression::Cast { operand } => {
                let address = self.address_arithmetic(operand, keep_array)?;
                Expr::cast(address, pointer_to_decayed(&lvalue.expr_type, keep_array))
            }
            _ => {
                return Err(SymexError::unsupported(
                    lvalue.kind_name(),
                    lvalue.as_ref(),
                ))
            }
        };

        let decayed = lvalue.expr_type.is_array() && !keep_array;
        if !decayed && result.expr_type != ExpressionType::pointer_to(lvalue.expr_type.clone()) {
            return Err(SymexError::InvariantViolation(format!(
                "the address of {} has type {} rather than {}*",
                lvalue, result.expr_type, lvalue.expr_type
            )));
        }
        Ok(result)
    }

    /// The address of a symbol, literal or label. Arrays decay to the address of their first
    /// element unless keep_array is set. A field of a decomposed struct variable that does not
    /// start at offset zero is addressed through its root object.
    fn address_of_object(&mut self, object: &Rc<Expr>, keep_array: bool) -> Result<Rc<Expr>> {
        let mut result = self.dereference_rec(object, false)?;
        if result.expr_type.is_array() && !keep_array {
            result = Expr::index(result, Expr::offset(0));
        }
        if let Expression::Symbol(symbol) = &object.expression {
            if symbol.is_field() {
                let offset = match symbol.intrinsic_offset(&self.ctx.ns) {
                    Some(offset) => offset,
                    None => assume_unreachable!("field symbol {} has no offset", symbol),
                };
                if offset > 0 {
                    let root_type = symbol.root_type.clone().unwrap_or(ExpressionType::Void);
                    let extract = Expr::byte_extract(
                        Expr::from_symbol(symbol.root(), root_type),
                        Expr::offset(offset as i64),
                        object.expr_type.clone(),
                    );
                    let address = self.address_arithmetic(&extract, keep_array)?;
                    return Ok(self.ctx.simplify(&address));
                }
            }
        }
        Ok(Expr::address_of(result))
    }

    /// Turns `&a`, with `a` of type `T[i][j]`, into `&a[0][0]` until the element type is
    /// target_type or is no longer an array.
    fn descend_to_element(&self, address: Rc<Expr>, target_type: &ExpressionType) -> Rc<Expr> {
        let mut object = match &address.expression {
            Expression::AddressOf { object } => object.clone(),
            _ => return address,
        };
        while object.expr_type.is_array() && object.expr_type != *target_type {
            object = Expr::index(object, Expr::offset(0));
        }
        Expr::address_of(object)
    }
}

/// A pointer to t, or to the element type of t if t is an array that decays.
fn pointer_to_decayed(t: &ExpressionType, keep_array: bool) -> ExpressionType {
    match t.element() {
        Some(element) if !keep_array => ExpressionType::pointer_to(element.clone()),
        _ => ExpressionType::pointer_to(t.clone()),
    }
}
