// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

/// The static type of an expression, closely modelled on the types of ANSI-C.
/// Struct types are referred to by tag and resolved through a `TypeTable`, which allows
/// self-referential structs such as linked list nodes.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ExpressionType {
    Bool,
    Char,
    Int,
    Long,
    Pointer(Rc<ExpressionType>),
    Array {
        element: Rc<ExpressionType>,
        length: u64,
    },
    Struct(Rc<str>),
    Void,
}

impl Debug for ExpressionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for ExpressionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionType::Bool => f.write_str("bool"),
            ExpressionType::Char => f.write_str("char"),
            ExpressionType::Int => f.write_str("int"),
            ExpressionType::Long => f.write_str("long"),
            ExpressionType::Pointer(pointee) => write!(f, "{}*", pointee),
            ExpressionType::Array { element, length } => write!(f, "{}[{}]", element, length),
            ExpressionType::Struct(tag) => write!(f, "struct {}", tag),
            ExpressionType::Void => f.write_str("void"),
        }
    }
}

impl ExpressionType {
    pub fn pointer_to(pointee: ExpressionType) -> ExpressionType {
        ExpressionType::Pointer(Rc::new(pointee))
    }

    pub fn array_of(element: ExpressionType, length: u64) -> ExpressionType {
        ExpressionType::Array {
            element: Rc::new(element),
            length,
        }
    }

    /// The type used for byte-granular address arithmetic.
    pub fn char_pointer() -> ExpressionType {
        ExpressionType::pointer_to(ExpressionType::Char)
    }

    /// The type of array indices and byte offsets.
    pub fn index_type() -> ExpressionType {
        ExpressionType::Long
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, ExpressionType::Pointer(..))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ExpressionType::Array { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, ExpressionType::Struct(..))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ExpressionType::Char | ExpressionType::Int | ExpressionType::Long
        )
    }

    /// True for the flexible array members of C: `T a[0]`.
    pub fn is_zero_length_array(&self) -> bool {
        matches!(self, ExpressionType::Array { length: 0, .. })
    }

    pub fn pointee(&self) -> Option<&ExpressionType> {
        if let ExpressionType::Pointer(pointee) = self {
            Some(pointee.as_ref())
        } else {
            None
        }
    }

    pub fn element(&self) -> Option<&ExpressionType> {
        if let ExpressionType::Array { element, .. } = self {
            Some(element.as_ref())
        } else {
            None
        }
    }

    /// Returns the number of bits used to represent values of this type, if it is a scalar.
    pub fn bit_length(&self) -> Option<u32> {
        match self {
            ExpressionType::Bool => Some(1),
            ExpressionType::Char => Some(8),
            ExpressionType::Int => Some(32),
            ExpressionType::Long | ExpressionType::Pointer(..) => Some(64),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct Field {
    pub name: Rc<str>,
    pub field_type: ExpressionType,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, Eq, PartialEq)]
pub struct StructType {
    pub fields: Vec<Field>,
}

/// The struct definitions of a program, keyed by tag. Provides the static layout queries
/// (sizes, alignments and field offsets) used to turn member and index chains into byte offsets.
#[derive(Serialize, Deserialize, Clone, Debug, Default, Eq, PartialEq)]
pub struct TypeTable {
    structs: BTreeMap<Rc<str>, StructType>,
}

impl TypeTable {
    /// Defines (or redefines) the struct with the given tag and returns its type.
    pub fn add_struct(&mut self, tag: &str, fields: Vec<(&str, ExpressionType)>) -> ExpressionType {
        let tag: Rc<str> = Rc::from(tag);
        let fields = fields
            .into_iter()
            .map(|(name, field_type)| Field {
                name: Rc::from(name),
                field_type,
            })
            .collect();
        self.structs.insert(tag.clone(), StructType { fields });
        ExpressionType::Struct(tag)
    }

    pub fn lookup(&self, tag: &str) -> Option<&StructType> {
        self.structs.get(tag)
    }

    /// The size in bytes of a value of the given type. None for void and undefined structs.
    #[logfn_inputs(TRACE)]
    pub fn size_of(&self, t: &ExpressionType) -> Option<u64> {
        match t {
            ExpressionType::Bool | ExpressionType::Char => Some(1),
            ExpressionType::Int => Some(4),
            ExpressionType::Long | ExpressionType::Pointer(..) => Some(8),
            ExpressionType::Array { element, length } => {
                self.size_of(element)?.checked_mul(*length)
            }
            ExpressionType::Struct(tag) => {
                let layout = self.struct_layout(tag)?;
                let end = layout
                    .last()
                    .map(|(_, offset, size)| offset + size)
                    .unwrap_or(0);
                Some(align_up(end, self.align_of(t)?))
            }
            ExpressionType::Void => None,
        }
    }

    pub fn align_of(&self, t: &ExpressionType) -> Option<u64> {
        match t {
            ExpressionType::Array { element, .. } => self.align_of(element),
            ExpressionType::Struct(tag) => {
                let mut alignment = 1;
                for field in self.lookup(tag)?.fields.iter() {
                    alignment = alignment.max(self.align_of(&field.field_type)?);
                }
                Some(alignment)
            }
            ExpressionType::Void => None,
            _ => self.size_of(t),
        }
    }

    /// (name, offset, size) for every field of the struct, in declaration order.
    fn struct_layout(&self, tag: &str) -> Option<Vec<(Rc<str>, u64, u64)>> {
        let mut offset = 0;
        let mut layout = Vec::new();
        for field in self.lookup(tag)?.fields.iter() {
            offset = align_up(offset, self.align_of(&field.field_type)?);
            let size = self.size_of(&field.field_type)?;
            layout.push((field.name.clone(), offset, size));
            offset += size;
        }
        Some(layout)
    }

    pub fn field_offset(&self, tag: &str, field: &str) -> Option<u64> {
        self.struct_layout(tag)?
            .into_iter()
            .find(|(name, ..)| name.as_ref() == field)
            .map(|(_, offset, _)| offset)
    }

    pub fn field_type(&self, tag: &str, field: &str) -> Option<ExpressionType> {
        self.lookup(tag)?
            .fields
            .iter()
            .find(|f| f.name.as_ref() == field)
            .map(|f| f.field_type.clone())
    }

    /// The byte offset of the component reached by following the given field path from a value
    /// of the given root type.
    pub fn offset_of_path(&self, root: &ExpressionType, path: &[Rc<str>]) -> Option<u64> {
        let mut offset = 0;
        let mut current = root.clone();
        for field in path {
            if let ExpressionType::Struct(tag) = &current {
                offset += self.field_offset(tag, field)?;
                current = self.field_type(tag, field)?;
            } else {
                return None;
            }
        }
        Some(offset)
    }

    /// Finds the field path of the component of `t` that starts exactly at `offset` and has
    /// type `target`. The empty path denotes the value itself.
    #[logfn_inputs(TRACE)]
    pub fn component_at(
        &self,
        t: &ExpressionType,
        offset: u64,
        target: &ExpressionType,
    ) -> Option<Vec<Rc<str>>> {
        if offset == 0 && t == target {
            return Some(vec![]);
        }
        let tag = if let ExpressionType::Struct(tag) = t {
            tag
        } else {
            return None;
        };
        for (name, field_offset, size) in self.struct_layout(tag)? {
            if offset < field_offset || offset >= field_offset + size.max(1) {
                continue;
            }
            let field_type = self.field_type(tag, &name)?;
            if let Some(mut path) = self.component_at(&field_type, offset - field_offset, target) {
                path.insert(0, name);
                return Some(path);
            }
        }
        None
    }

    /// The non-struct components of a value of type `t`, with the field path leading to each.
    /// A non-struct type has a single leaf: itself, at the empty path.
    pub fn leaves(&self, t: &ExpressionType) -> Vec<(Vec<Rc<str>>, ExpressionType)> {
        let mut result = Vec::new();
        self.collect_leaves(t, &mut vec![], &mut result);
        result
    }

    fn collect_leaves(
        &self,
        t: &ExpressionType,
        path: &mut Vec<Rc<str>>,
        result: &mut Vec<(Vec<Rc<str>>, ExpressionType)>,
    ) {
        match t {
            ExpressionType::Struct(tag) => {
                if let Some(struct_type) = self.lookup(tag) {
                    for field in struct_type.fields.iter() {
                        path.push(field.name.clone());
                        self.collect_leaves(&field.field_type, path, result);
                        path.pop();
                    }
                }
            }
            _ => result.push((path.clone(), t.clone())),
        }
    }
}

fn align_up(offset: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        offset
    } else {
        offset.div_ceil(alignment) * alignment
    }
}
