// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::{Alternative, PointsToOracle};
use crate::errors::{Result, SymexError};
use crate::expression::{BinaryOperator, ConstantValue, Expr, Expression, Symbol};
use crate::k_limits;
use crate::path_state::PathState;
use crate::types::{ExpressionType, TypeTable};

use log_derive::logfn_inputs;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// The name of the object that stands for whatever an invalid pointer that is not a variable
/// points to.
pub const FAILED_SYMBOL: &str = "symex::failed_symbol";

/// Something a pointer may point to.
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum PointsTo {
    /// A byte offset into a root object. The offset is None if it is not a known constant.
    Object {
        root: Rc<Expr>,
        offset: Option<i64>,
    },
    Null,
    /// An object that is not known, or an invalid address.
    Unknown,
}

impl Debug for PointsTo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PointsTo::Object {
                root,
                offset: Some(offset),
            } => write!(f, "<{}, {}>", root, offset),
            PointsTo::Object { root, offset: None } => write!(f, "<{}, *>", root),
            PointsTo::Null => f.write_str("<NULL>"),
            PointsTo::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// The set of things a pointer may point to. Sets that grow too large collapse into Unknown.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValueSet {
    entries: Rc<Vec<PointsTo>>,
}

impl ValueSet {
    pub fn singleton(entry: PointsTo) -> ValueSet {
        ValueSet {
            entries: Rc::new(vec![entry]),
        }
    }

    pub fn unknown() -> ValueSet {
        ValueSet::singleton(PointsTo::Unknown)
    }

    pub fn entries(&self) -> &[PointsTo] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn union(&self, other: &ValueSet) -> ValueSet {
        if other.entries.iter().all(|e| self.entries.contains(e)) {
            return self.clone();
        }
        let mut entries = self.entries.as_ref().clone();
        for entry in other.entries.iter() {
            if !entries.contains(entry) {
                entries.push(entry.clone());
            }
        }
        if entries.len() > k_limits::MAX_VALUE_SET_ENTRIES {
            return ValueSet::unknown();
        }
        ValueSet {
            entries: Rc::new(entries),
        }
    }

    fn map_offsets(&self, f: &dyn Fn(i64) -> Option<i64>) -> ValueSet {
        let entries = self
            .entries
            .iter()
            .map(|e| match e {
                PointsTo::Object { root, offset } => PointsTo::Object {
                    root: root.clone(),
                    offset: offset.and_then(f),
                },
                PointsTo::Null => PointsTo::Unknown,
                PointsTo::Unknown => PointsTo::Unknown,
            })
            .fold(Vec::new(), |mut acc, e| {
                if !acc.contains(&e) {
                    acc.push(e);
                }
                acc
            });
        ValueSet {
            entries: Rc::new(entries),
        }
    }
}

/// The key under which the value set shared by all elements of an array of pointers is kept.
pub fn element_summary_key(array: &Symbol) -> Rc<str> {
    Rc::from(format!("{}[]", array.l1_key()).as_str())
}

/// Computes the value set of a pointer expression that has been renamed to level 1.
#[logfn_inputs(TRACE)]
pub fn value_set_of(ns: &TypeTable, state: &PathState, pointer: &Rc<Expr>) -> ValueSet {
    match &pointer.expression {
        Expression::Symbol(symbol) => state
            .value_set(&symbol.l1_key())
            .cloned()
            .unwrap_or_else(ValueSet::unknown),
        Expression::CompileTimeConstant(ConstantValue::Null) => ValueSet::singleton(PointsTo::Null),
        Expression::CompileTimeConstant(ConstantValue::Int(0)) => {
            ValueSet::singleton(PointsTo::Null)
        }
        Expression::AddressOf { object } => objects_of(ns, state, object),
        Expression::Cast { operand } => value_set_of(ns, state, operand),
        Expression::ConditionalExpression {
            consequent,
            alternate,
            ..
        } => value_set_of(ns, state, consequent).union(&value_set_of(ns, state, alternate)),
        Expression::Binary {
            operator: operator @ (BinaryOperator::Add | BinaryOperator::Sub),
            left,
            right,
        } => {
            let (base, distance) = if left.expr_type.is_pointer() {
                (left, right)
            } else {
                (right, left)
            };
            let set = value_set_of(ns, state, base);
            let scale = base
                .expr_type
                .pointee()
                .and_then(|t| ns.size_of(t))
                .map(|s| s as i64);
            match (distance.as_int_if_known(), scale) {
                (Some(d), Some(scale)) => {
                    let delta = if *operator == BinaryOperator::Sub {
                        d.checked_neg().and_then(|d| d.checked_mul(scale))
                    } else {
                        d.checked_mul(scale)
                    };
                    set.map_offsets(&|o| delta.and_then(|d| o.checked_add(d)))
                }
                _ => set.map_offsets(&|_| None),
            }
        }
        Expression::Index { array, .. } => match &array.expression {
            Expression::Symbol(symbol) => state
                .value_set(&element_summary_key(symbol))
                .cloned()
                .unwrap_or_else(ValueSet::unknown),
            _ => ValueSet::unknown(),
        },
        _ => ValueSet::unknown(),
    }
}

/// The objects that the address of the lvalue may point to.
fn objects_of(ns: &TypeTable, state: &PathState, lvalue: &Rc<Expr>) -> ValueSet {
    match &lvalue.expression {
        Expression::Symbol(symbol) => {
            if symbol.is_field() {
                let root_type = symbol.root_type.clone().unwrap_or(ExpressionType::Void);
                let root = Expr::from_symbol(symbol.root(), root_type);
                let offset = symbol.intrinsic_offset(ns).map(|o| o as i64);
                ValueSet::singleton(PointsTo::Object { root, offset })
            } else {
                ValueSet::singleton(PointsTo::Object {
                    root: Expr::from_symbol(symbol.l1(), lvalue.expr_type.clone()),
                    offset: Some(0),
                })
            }
        }
        Expression::Member { operand, field } => {
            let field_offset = match &operand.expr_type {
                ExpressionType::Struct(tag) => ns.field_offset(tag, field).map(|o| o as i64),
                _ => None,
            };
            objects_of(ns, state, operand)
                .map_offsets(&|o| field_offset.and_then(|f| o.checked_add(f)))
        }
        Expression::Index { array, index } => {
            let size = ns.size_of(&lvalue.expr_type).map(|s| s as i64);
            let delta = index
                .as_int_if_known()
                .zip(size)
                .and_then(|(i, s)| i.checked_mul(s));
            objects_of(ns, state, array).map_offsets(&|o| delta.and_then(|d| o.checked_add(d)))
        }
        Expression::ByteExtract { operand, offset } => {
            let delta = offset.as_int_if_known();
            objects_of(ns, state, operand)
                .map_offsets(&|o| delta.and_then(|d| o.checked_add(d)))
        }
        Expression::Cast { operand } => objects_of(ns, state, operand),
        Expression::ConditionalExpression {
            consequent,
            alternate,
            ..
        } => objects_of(ns, state, consequent).union(&objects_of(ns, state, alternate)),
        Expression::Dereference { pointer } => value_set_of(ns, state, pointer),
        Expression::StringConstant(..) | Expression::ArrayLiteral { .. } => {
            ValueSet::singleton(PointsTo::Object {
                root: lvalue.clone(),
                offset: Some(0),
            })
        }
        _ => ValueSet::unknown(),
    }
}

/// A points-to oracle that uses the value sets that the path state maintains for every pointer
/// variable.
#[derive(Debug, Default)]
pub struct ValueSetDereference {}

impl PointsToOracle for ValueSetDereference {
    #[logfn_inputs(TRACE)]
    fn resolve_pointer(
        &self,
        ns: &TypeTable,
        state: &PathState,
        pointer: &Rc<Expr>,
        allow_fast_path_if_safe: bool,
    ) -> Result<Vec<Alternative>> {
        let target_type = match pointer.expr_type.pointee() {
            Some(t) => t.clone(),
            None => return Err(SymexError::unsupported("dereference", pointer.as_ref())),
        };
        let value_set = value_set_of(ns, state, pointer);
        let mut may_be_invalid = false;
        let mut alternatives = Vec::new();
        for entry in value_set.entries() {
            match entry {
                PointsTo::Object { root, offset } => alternatives.push(Alternative {
                    guard: guard_for(pointer, root, *offset),
                    object: object_for(ns, pointer, root, *offset, &target_type),
                }),
                PointsTo::Null | PointsTo::Unknown => may_be_invalid = true,
            }
        }
        if alternatives.len() == 1 && (!may_be_invalid || allow_fast_path_if_safe) {
            let object = alternatives.remove(0).object;
            return Ok(vec![Alternative {
                guard: Expr::bool(true),
                object,
            }]);
        }
        if may_be_invalid || alternatives.is_empty() {
            alternatives.push(Alternative {
                guard: Expr::bool(true),
                object: failed_object(pointer, &target_type),
            });
        }
        Ok(alternatives)
    }
}

/// The object that an invalid pointer points to. Each pointer variable has its own.
pub fn failed_object(pointer: &Rc<Expr>, target_type: &ExpressionType) -> Rc<Expr> {
    let name = match &pointer.expression {
        Expression::Symbol(symbol) => format!("{}$object", symbol.l0()),
        _ => FAILED_SYMBOL.to_string(),
    };
    Expr::symbol(&name, target_type.clone())
}

/// The condition under which the pointer points to the given offset of root.
fn guard_for(pointer: &Rc<Expr>, root: &Rc<Expr>, offset: Option<i64>) -> Rc<Expr> {
    let address = Expr::address_of(root.clone());
    match offset {
        None => Expr::same_object(pointer.clone(), address),
        Some(0) => Expr::equals(pointer.clone(), cast_if_needed(address, &pointer.expr_type)),
        Some(offset) => {
            let bytes = Expr::cast(address, ExpressionType::char_pointer());
            let moved = Expr::add(bytes, Expr::offset(offset));
            Expr::equals(pointer.clone(), Expr::cast(moved, pointer.expr_type.clone()))
        }
    }
}

/// The expression for the value of type target_type that starts at the given offset of root.
fn object_for(
    ns: &TypeTable,
    pointer: &Rc<Expr>,
    root: &Rc<Expr>,
    offset: Option<i64>,
    target_type: &ExpressionType,
) -> Rc<Expr> {
    if offset == Some(0) && root.expr_type == *target_type {
        return root.clone();
    }
    if let Some(element_type) = root.expr_type.element() {
        if element_type == target_type {
            if let Some(size) = ns.size_of(element_type).filter(|s| *s > 0) {
                let size = size as i64;
                let index = match offset {
                    Some(offset) if offset % size == 0 => Some(Expr::offset(offset / size)),
                    Some(_) => None,
                    None => Some(Expr::binary(
                        BinaryOperator::Div,
                        Expr::pointer_offset(pointer.clone()),
                        Expr::offset(size),
                    )),
                };
                if let Some(index) = index {
                    return Expr::index(root.clone(), index);
                }
            }
        }
    }
    let offset = match offset {
        Some(offset) => Expr::offset(offset),
        None => Expr::pointer_offset(pointer.clone()),
    };
    Expr::byte_extract(root.clone(), offset, target_type.clone())
}

fn cast_if_needed(expr: Rc<Expr>, target_type: &ExpressionType) -> Rc<Expr> {
    if expr.expr_type == *target_type {
        expr
    } else {
        Expr::cast(expr, target_type.clone())
    }
}

/// Folds the alternatives into a nest of conditional expressions. The guard of the last
/// alternative is not needed.
pub fn combine(alternatives: &[Alternative]) -> Result<Rc<Expr>> {
    let (last, rest) = match alternatives.split_last() {
        Some(split) => split,
        None => return Err(SymexError::EmptyPointsToSet(String::from("combine"))),
    };
    Ok(rest.iter().rev().fold(last.object.clone(), |result, alternative| {
        Expr::conditional(alternative.guard.clone(), alternative.object.clone(), result)
    }))
}
