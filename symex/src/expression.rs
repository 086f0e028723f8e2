// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::types::{ExpressionType, TypeTable};

use mirai_annotations::*;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

/// An expression node together with its static type. Nodes are immutable and shared via `Rc`,
/// so rewriting a sub-tree always produces new nodes and never disturbs other owners.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
pub struct Expr {
    pub expression: Expression,
    pub expr_type: ExpressionType,
}

impl Debug for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Closely based on the expressions found in the intermediate representation of C programs.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Expression {
    /// The address of the object denoted by an lvalue. &
    AddressOf { object: Rc<Expr> },

    /// An array value given element by element. {e0, e1, ...}
    ArrayLiteral { elements: Vec<Rc<Expr>> },

    /// Arithmetic, comparison and logic on two operands.
    Binary {
        operator: BinaryOperator,
        // The value of the left operand.
        left: Rc<Expr>,
        // The value of the right operand.
        right: Rc<Expr>,
    },

    /// Reinterprets the bytes of operand, starting at the given byte offset, as a value of the
    /// type of this expression.
    ByteExtract { operand: Rc<Expr>, offset: Rc<Expr> },

    /// An expression that is the operand converted to the type of this expression.
    Cast { operand: Rc<Expr> },

    /// A literal value.
    CompileTimeConstant(ConstantValue),

    /// An expression that is either consequent or alternate, depending on the value of condition.
    ConditionalExpression {
        // A condition that results in a Boolean value
        condition: Rc<Expr>,
        // The value of this expression if condition is true.
        consequent: Rc<Expr>,
        // The value of this expression if condition is false.
        alternate: Rc<Expr>,
    },

    /// The value stored at the address held by pointer. *
    Dereference { pointer: Rc<Expr> },

    /// The element of array at position index. []
    Index { array: Rc<Expr>, index: Rc<Expr> },

    /// The address of a code location.
    Label(Rc<str>),

    /// The named field of a struct value. .
    Member { operand: Rc<Expr>, field: Rc<str> },

    /// The byte offset of pointer relative to the start of the object it points into.
    PointerOffset { pointer: Rc<Expr> },

    /// True if left and right point into the same object.
    SameObject { left: Rc<Expr>, right: Rc<Expr> },

    /// A string literal. Its type is an array of char that includes the terminating zero.
    StringConstant(Rc<str>),

    /// A variable, possibly a field of a decomposed struct variable.
    Symbol(Symbol),

    Unary {
        operator: UnaryOperator,
        operand: Rc<Expr>,
    },

    /// A copy of array where the element at index has been replaced with value.
    Update {
        array: Rc<Expr>,
        index: Rc<Expr>,
        value: Rc<Expr>,
    },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Equals,
    Ne,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::Ne
                | BinaryOperator::LessThan
                | BinaryOperator::LessOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Equals => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOperator {
    Not,
    Neg,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConstantValue {
    Bool(bool),
    Int(i64),
    /// The null pointer.
    Null,
}

/// A variable occurrence. The base name plus field path identify the variable (level 0), the
/// call frame distinguishes instances of locals of different activations (level 1) and the
/// version distinguishes successive assignments to the same instance (level 2).
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Symbol {
    pub name: Rc<str>,
    /// Non empty for a field of a decomposed struct variable.
    #[serde(default)]
    pub fields: Vec<Rc<str>>,
    /// The type of the variable called name, for field symbols.
    #[serde(default)]
    pub root_type: Option<ExpressionType>,
    #[serde(default)]
    pub frame: Option<u32>,
    #[serde(default)]
    pub version: Option<u32>,
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for field in self.fields.iter() {
            write!(f, "..{}", field)?;
        }
        if let Some(frame) = self.frame {
            write!(f, "!{}", frame)?;
        }
        if let Some(version) = self.version {
            write!(f, "#{}", version)?;
        }
        Ok(())
    }
}

impl Symbol {
    pub fn new(name: &str) -> Symbol {
        Symbol {
            name: Rc::from(name),
            fields: vec![],
            root_type: None,
            frame: None,
            version: None,
        }
    }

    /// The symbol for the given field of this (struct typed) symbol. The version is dropped
    /// since every field is versioned independently.
    pub fn field(&self, parent_type: &ExpressionType, field: &Rc<str>) -> Symbol {
        let mut fields = self.fields.clone();
        fields.push(field.clone());
        Symbol {
            name: self.name.clone(),
            fields,
            root_type: self
                .root_type
                .clone()
                .or_else(|| Some(parent_type.clone())),
            frame: self.frame,
            version: None,
        }
    }

    /// The symbol for the whole variable this symbol is a field of (or self).
    pub fn root(&self) -> Symbol {
        Symbol {
            name: self.name.clone(),
            fields: vec![],
            root_type: None,
            frame: self.frame,
            version: None,
        }
    }

    pub fn is_field(&self) -> bool {
        !self.fields.is_empty()
    }

    /// The level 0 identity: name and field path.
    pub fn l0(&self) -> Symbol {
        Symbol {
            frame: None,
            version: None,
            ..self.clone()
        }
    }

    /// The level 1 identity: name, field path and frame.
    pub fn l1(&self) -> Symbol {
        Symbol {
            version: None,
            ..self.clone()
        }
    }

    /// A string key that identifies the level 1 instance of this variable.
    pub fn l1_key(&self) -> Rc<str> {
        Rc::from(self.l1().to_string().as_str())
    }

    /// A string key that identifies the level 1 instance of the root object of this variable.
    /// Writes to any field of a variable invalidate everything derived from this key.
    pub fn object_key(&self) -> Rc<str> {
        Rc::from(self.root().to_string().as_str())
    }

    /// The byte offset of this (field) symbol within its root object.
    pub fn intrinsic_offset(&self, ns: &TypeTable) -> Option<u64> {
        match &self.root_type {
            Some(root_type) if self.is_field() => ns.offset_of_path(root_type, &self.fields),
            _ => Some(0),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.expression {
            Expression::AddressOf { object } => write!(f, "&({})", object),
            Expression::ArrayLiteral { elements } => {
                f.write_str("{")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str("}")
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator.symbol(), right),
            Expression::ByteExtract { operand, offset } => write!(
                f,
                "byte_extract({}, {}, {})",
                operand, offset, self.expr_type
            ),
            Expression::Cast { operand } => write!(f, "(({}){})", self.expr_type, operand),
            Expression::CompileTimeConstant(ConstantValue::Bool(b)) => write!(f, "{}", b),
            Expression::CompileTimeConstant(ConstantValue::Int(i)) => write!(f, "{}", i),
            Expression::CompileTimeConstant(ConstantValue::Null) => f.write_str("NULL"),
            Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            } => write!(f, "({} ? {} : {})", condition, consequent, alternate),
            Expression::Dereference { pointer } => write!(f, "*({})", pointer),
            Expression::Index { array, index } => write!(f, "{}[{}]", array, index),
            Expression::Label(name) => write!(f, "{}:", name),
            Expression::Member { operand, field } => write!(f, "{}.{}", operand, field),
            Expression::PointerOffset { pointer } => write!(f, "pointer_offset({})", pointer),
            Expression::SameObject { left, right } => {
                write!(f, "same_object({}, {})", left, right)
            }
            Expression::StringConstant(s) => write!(f, "{:?}", s),
            Expression::Symbol(symbol) => write!(f, "{}", symbol),
            Expression::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => write!(f, "!{}", operand),
            Expression::Unary {
                operator: UnaryOperator::Neg,
                operand,
            } => write!(f, "-{}", operand),
            Expression::Update {
                array,
                index,
                value,
            } => write!(f, "({} with [{}] = {})", array, index, value),
        }
    }
}

impl Expr {
    pub fn new(expression: Expression, expr_type: ExpressionType) -> Rc<Expr> {
        Rc::new(Expr {
            expression,
            expr_type,
        })
    }

    /// A short name for the kind of this expression, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.expression {
            Expression::AddressOf { .. } => "address_of",
            Expression::ArrayLiteral { .. } => "array",
            Expression::Binary { .. } => "binary",
            Expression::ByteExtract { .. } => "byte_extract",
            Expression::Cast { .. } => "typecast",
            Expression::CompileTimeConstant(..) => "constant",
            Expression::ConditionalExpression { .. } => "if",
            Expression::Dereference { .. } => "dereference",
            Expression::Index { .. } => "index",
            Expression::Label(..) => "label",
            Expression::Member { .. } => "member",
            Expression::PointerOffset { .. } => "pointer_offset",
            Expression::SameObject { .. } => "same_object",
            Expression::StringConstant(..) => "string_constant",
            Expression::Symbol(..) => "symbol",
            Expression::Unary { .. } => "unary",
            Expression::Update { .. } => "with",
        }
    }

    /// The operands of this expression, in order.
    pub fn children(&self) -> Vec<&Rc<Expr>> {
        match &self.expression {
            Expression::AddressOf { object } => vec![object],
            Expression::ArrayLiteral { elements } => elements.iter().collect(),
            Expression::Binary { left, right, .. } | Expression::SameObject { left, right } => {
                vec![left, right]
            }
            Expression::ByteExtract { operand, offset } => vec![operand, offset],
            Expression::Cast { operand }
            | Expression::Member { operand, .. }
            | Expression::Unary { operand, .. } => vec![operand],
            Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            } => vec![condition, consequent, alternate],
            Expression::Dereference { pointer } | Expression::PointerOffset { pointer } => {
                vec![pointer]
            }
            Expression::Index { array, index } => vec![array, index],
            Expression::Update {
                array,
                index,
                value,
            } => vec![array, index, value],
            Expression::CompileTimeConstant(..)
            | Expression::Label(..)
            | Expression::StringConstant(..)
            | Expression::Symbol(..) => vec![],
        }
    }

    /// Rebuilds this expression with every operand replaced by the result of applying f to it.
    /// If f returns every operand unchanged, self is returned without allocating.
    pub fn try_map_children<E, F>(self: &Rc<Expr>, mut f: F) -> Result<Rc<Expr>, E>
    where
        F: FnMut(&Rc<Expr>) -> Result<Rc<Expr>, E>,
    {
        let mut changed = false;
        let mut g = |e: &Rc<Expr>| -> Result<Rc<Expr>, E> {
            let r = f(e)?;
            changed |= !Rc::ptr_eq(&r, e);
            Ok(r)
        };
        let expression = match &self.expression {
            Expression::AddressOf { object } => Expression::AddressOf { object: g(object)? },
            Expression::ArrayLiteral { elements } => Expression::ArrayLiteral {
                elements: elements.iter().map(&mut g).collect::<Result<_, E>>()?,
            },
            Expression::Binary {
                operator,
                left,
                right,
            } => Expression::Binary {
                operator: *operator,
                left: g(left)?,
                right: g(right)?,
            },
            Expression::ByteExtract { operand, offset } => Expression::ByteExtract {
                operand: g(operand)?,
                offset: g(offset)?,
            },
            Expression::Cast { operand } => Expression::Cast {
                operand: g(operand)?,
            },
            Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            } => Expression::ConditionalExpression {
                condition: g(condition)?,
                consequent: g(consequent)?,
                alternate: g(alternate)?,
            },
            Expression::Dereference { pointer } => Expression::Dereference {
                pointer: g(pointer)?,
            },
            Expression::Index { array, index } => Expression::Index {
                array: g(array)?,
                index: g(index)?,
            },
            Expression::Member { operand, field } => Expression::Member {
                operand: g(operand)?,
                field: field.clone(),
            },
            Expression::PointerOffset { pointer } => Expression::PointerOffset {
                pointer: g(pointer)?,
            },
            Expression::SameObject { left, right } => Expression::SameObject {
                left: g(left)?,
                right: g(right)?,
            },
            Expression::Unary { operator, operand } => Expression::Unary {
                operator: *operator,
                operand: g(operand)?,
            },
            Expression::Update {
                array,
                index,
                value,
            } => Expression::Update {
                array: g(array)?,
                index: g(index)?,
                value: g(value)?,
            },
            Expression::CompileTimeConstant(..)
            | Expression::Label(..)
            | Expression::StringConstant(..)
            | Expression::Symbol(..) => return Ok(self.clone()),
        };
        if changed {
            Ok(Expr::new(expression, self.expr_type.clone()))
        } else {
            Ok(self.clone())
        }
    }

    pub fn map_children<F>(self: &Rc<Expr>, mut f: F) -> Rc<Expr>
    where
        F: FnMut(&Rc<Expr>) -> Rc<Expr>,
    {
        match self.try_map_children::<Infallible, _>(|e| Ok(f(e))) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Calls f on every node of this expression, parents before children.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    pub fn contains_dereference(&self) -> bool {
        if let Expression::Dereference { .. } = self.expression {
            return true;
        }
        self.children().iter().any(|c| c.contains_dereference())
    }

    /// All symbol occurrences in this expression, in pre-order.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut result = vec![];
        self.visit(&mut |e| {
            if let Expression::Symbol(symbol) = &e.expression {
                result.push(symbol.clone());
            }
        });
        result
    }

    /// The number of nodes in this expression.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    /// This expression with every symbol reduced to its level 0 identity.
    pub fn l0(self: &Rc<Expr>) -> Rc<Expr> {
        if let Expression::Symbol(symbol) = &self.expression {
            if symbol.frame.is_none() && symbol.version.is_none() {
                return self.clone();
            }
            return Expr::new(
                Expression::Symbol(symbol.l0()),
                self.expr_type.clone(),
            );
        }
        self.map_children(|c| c.l0())
    }

    pub fn as_bool_if_known(&self) -> Option<bool> {
        match &self.expression {
            Expression::CompileTimeConstant(ConstantValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int_if_known(&self) -> Option<i64> {
        match &self.expression {
            Expression::CompileTimeConstant(ConstantValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self.expression,
            Expression::CompileTimeConstant(ConstantValue::Null)
        )
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        if let Expression::Symbol(symbol) = &self.expression {
            Some(symbol)
        } else {
            None
        }
    }

    // Builders. These compute the type of the new node from the types of the operands.

    pub fn symbol(name: &str, expr_type: ExpressionType) -> Rc<Expr> {
        Expr::new(Expression::Symbol(Symbol::new(name)), expr_type)
    }

    pub fn from_symbol(symbol: Symbol, expr_type: ExpressionType) -> Rc<Expr> {
        Expr::new(Expression::Symbol(symbol), expr_type)
    }

    pub fn int(value: i64, expr_type: ExpressionType) -> Rc<Expr> {
        Expr::new(
            Expression::CompileTimeConstant(ConstantValue::Int(value)),
            expr_type,
        )
    }

    /// An integer of the type used for offsets and indices.
    pub fn offset(value: i64) -> Rc<Expr> {
        Expr::int(value, ExpressionType::index_type())
    }

    pub fn bool(value: bool) -> Rc<Expr> {
        Expr::new(
            Expression::CompileTimeConstant(ConstantValue::Bool(value)),
            ExpressionType::Bool,
        )
    }

    pub fn null(pointer_type: ExpressionType) -> Rc<Expr> {
        precondition!(pointer_type.is_pointer());
        Expr::new(
            Expression::CompileTimeConstant(ConstantValue::Null),
            pointer_type,
        )
    }

    pub fn string(value: &str) -> Rc<Expr> {
        let length = value.len() as u64 + 1;
        Expr::new(
            Expression::StringConstant(Rc::from(value)),
            ExpressionType::array_of(ExpressionType::Char, length),
        )
    }

    pub fn label(name: &str) -> Rc<Expr> {
        Expr::new(Expression::Label(Rc::from(name)), ExpressionType::Void)
    }

    pub fn array_literal(elements: Vec<Rc<Expr>>, element_type: ExpressionType) -> Rc<Expr> {
        let length = elements.len() as u64;
        Expr::new(
            Expression::ArrayLiteral { elements },
            ExpressionType::array_of(element_type, length),
        )
    }

    pub fn dereference(pointer: Rc<Expr>) -> Rc<Expr> {
        let pointee = match pointer.expr_type.pointee() {
            Some(t) => t.clone(),
            None => assume_unreachable!("dereference of a non pointer: {}", pointer),
        };
        Expr::new(Expression::Dereference { pointer }, pointee)
    }

    pub fn address_of(object: Rc<Expr>) -> Rc<Expr> {
        let pointer_type = ExpressionType::pointer_to(object.expr_type.clone());
        Expr::new(Expression::AddressOf { object }, pointer_type)
    }

    pub fn member(ns: &TypeTable, operand: Rc<Expr>, field: &str) -> Rc<Expr> {
        let field_type = match &operand.expr_type {
            ExpressionType::Struct(tag) => ns.field_type(tag, field),
            _ => None,
        };
        match field_type {
            Some(field_type) => Expr::new(
                Expression::Member {
                    operand,
                    field: Rc::from(field),
                },
                field_type,
            ),
            None => assume_unreachable!("{} has no field named {}", operand, field),
        }
    }

    /// The field of the struct that pointer points to. ->
    pub fn arrow(ns: &TypeTable, pointer: Rc<Expr>, field: &str) -> Rc<Expr> {
        Expr::member(ns, Expr::dereference(pointer), field)
    }

    pub fn index(array: Rc<Expr>, index: Rc<Expr>) -> Rc<Expr> {
        let element_type = match &array.expr_type {
            ExpressionType::Array { element, .. } | ExpressionType::Pointer(element) => {
                element.as_ref().clone()
            }
            _ => assume_unreachable!("index into a non array: {}", array),
        };
        Expr::new(Expression::Index { array, index }, element_type)
    }

    pub fn byte_extract(
        operand: Rc<Expr>,
        offset: Rc<Expr>,
        expr_type: ExpressionType,
    ) -> Rc<Expr> {
        Expr::new(Expression::ByteExtract { operand, offset }, expr_type)
    }

    pub fn cast(operand: Rc<Expr>, target_type: ExpressionType) -> Rc<Expr> {
        Expr::new(Expression::Cast { operand }, target_type)
    }

    pub fn conditional(
        condition: Rc<Expr>,
        consequent: Rc<Expr>,
        alternate: Rc<Expr>,
    ) -> Rc<Expr> {
        let expr_type = consequent.expr_type.clone();
        Expr::new(
            Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            },
            expr_type,
        )
    }

    pub fn binary(operator: BinaryOperator, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        let expr_type = if operator.is_comparison() || operator.is_logical() {
            ExpressionType::Bool
        } else if right.expr_type.is_pointer() && !left.expr_type.is_pointer() {
            right.expr_type.clone()
        } else if operator == BinaryOperator::Sub
            && left.expr_type.is_pointer()
            && right.expr_type.is_pointer()
        {
            ExpressionType::Long
        } else {
            left.expr_type.clone()
        };
        Expr::new(
            Expression::Binary {
                operator,
                left,
                right,
            },
            expr_type,
        )
    }

    pub fn add(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOperator::Add, left, right)
    }

    pub fn and(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOperator::Or, left, right)
    }

    pub fn equals(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::binary(BinaryOperator::Equals, left, right)
    }

    pub fn not(operand: Rc<Expr>) -> Rc<Expr> {
        Expr::new(
            Expression::Unary {
                operator: UnaryOperator::Not,
                operand,
            },
            ExpressionType::Bool,
        )
    }

    pub fn same_object(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        Expr::new(Expression::SameObject { left, right }, ExpressionType::Bool)
    }

    pub fn pointer_offset(pointer: Rc<Expr>) -> Rc<Expr> {
        Expr::new(
            Expression::PointerOffset { pointer },
            ExpressionType::index_type(),
        )
    }

    pub fn update(array: Rc<Expr>, index: Rc<Expr>, value: Rc<Expr>) -> Rc<Expr> {
        let expr_type = array.expr_type.clone();
        Expr::new(
            Expression::Update {
                array,
                index,
                value,
            },
            expr_type,
        )
    }
}
