// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::SafetyOracle;
use crate::expression::{BinaryOperator, Expr, Expression, UnaryOperator};
use crate::program::{Program, Statement, StatementKind};

use rpds::HashTrieSet;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A local, syntactic analysis of the pointer variables that are known to be non null.
/// Inside the then branch of `if (p != NULL)` (or the else branch of `if (p == NULL)`, or the
/// body of `while (p)`), dereferences of `p` are always valid until `p` is assigned.
/// Pointers whose address is taken anywhere in the program are never considered safe.
#[derive(Debug, Default)]
pub struct LocalSafePointers {
    function: String,
    // program point -> level 0 dereferences that are safe at that point
    safe_dereferences: HashMap<usize, HashSet<Rc<Expr>>>,
}

type NonNull = HashTrieSet<Rc<str>>;

impl LocalSafePointers {
    pub fn analyze(program: &Program) -> LocalSafePointers {
        let mut result = LocalSafePointers {
            function: program.name.clone(),
            safe_dereferences: HashMap::new(),
        };
        let mut address_taken = HashSet::new();
        for statement in program.body.iter() {
            collect_address_taken(statement, &mut address_taken);
        }
        let mut analysis = Analysis {
            address_taken,
            result: &mut result,
        };
        analysis.block(&program.body, NonNull::new());
        debug!(
            "{} program points have always valid dereferences",
            result.safe_dereferences.len()
        );
        result
    }

    pub fn safe_dereferences_at(&self, point: usize) -> Option<&HashSet<Rc<Expr>>> {
        self.safe_dereferences.get(&point)
    }
}

impl SafetyOracle for LocalSafePointers {
    fn is_always_valid(&self, dereference: &Rc<Expr>, function: &str, point: usize) -> bool {
        function == self.function
            && self
                .safe_dereferences
                .get(&point)
                .map(|set| set.contains(dereference))
                .unwrap_or(false)
    }
}

struct Analysis<'a> {
    address_taken: HashSet<Rc<str>>,
    result: &'a mut LocalSafePointers,
}

impl Analysis<'_> {
    /// Returns the non null pointers at the end of the block, or None if the block always returns.
    fn block(&mut self, statements: &[Statement], mut non_null: NonNull) -> Option<NonNull> {
        for statement in statements {
            non_null = self.statement(statement, non_null)?;
        }
        Some(non_null)
    }

    fn statement(&mut self, statement: &Statement, non_null: NonNull) -> Option<NonNull> {
        match &statement.kind {
            StatementKind::Declare { symbol, init } => {
                if let Some(init) = init {
                    self.record(statement.point, init, &non_null);
                }
                Some(kill(non_null, symbol))
            }
            StatementKind::Input { symbol } => Some(kill(non_null, symbol)),
            StatementKind::Assign { target, value } => {
                self.record(statement.point, target, &non_null);
                self.record(statement.point, value, &non_null);
                Some(kill(non_null, target))
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.record(statement.point, condition, &non_null);
                let then_end =
                    self.block(then_branch, self.assume(non_null.clone(), condition, true));
                let else_end = self.block(else_branch, self.assume(non_null, condition, false));
                match (then_end, else_end) {
                    (Some(t), Some(e)) => Some(intersect(&t, &e)),
                    (Some(t), None) => Some(t),
                    (None, e) => e,
                }
            }
            StatementKind::While { condition, body } => {
                let mut assigned = HashSet::new();
                for statement in body {
                    collect_assigned(statement, &mut assigned);
                }
                let mut head = non_null;
                for pointer in assigned.iter() {
                    head.remove_mut(pointer);
                }
                self.record(statement.point, condition, &head);
                self.block(body, self.assume(head.clone(), condition, true));
                Some(self.assume(head, condition, false))
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    self.record(statement.point, value, &non_null);
                }
                None
            }
        }
    }

    /// Adds the pointers that the condition having the given value shows to be non null.
    fn assume(&self, mut non_null: NonNull, condition: &Rc<Expr>, value: bool) -> NonNull {
        match &condition.expression {
            Expression::Symbol(symbol) if value && condition.expr_type.is_pointer() => {
                if !self.address_taken.contains(&symbol.name) {
                    non_null.insert_mut(symbol.name.clone());
                }
            }
            Expression::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => return self.assume(non_null, operand, !value),
            Expression::Binary {
                operator: BinaryOperator::And,
                left,
                right,
            } if value => {
                let non_null = self.assume(non_null, left, true);
                return self.assume(non_null, right, true);
            }
            Expression::Binary {
                operator: BinaryOperator::Or,
                left,
                right,
            } if !value => {
                let non_null = self.assume(non_null, left, false);
                return self.assume(non_null, right, false);
            }
            Expression::Binary {
                operator: operator @ (BinaryOperator::Ne | BinaryOperator::Equals),
                left,
                right,
            } => {
                let non_null_when = *operator == BinaryOperator::Ne;
                if value == non_null_when {
                    if let Some(name) = compared_with_null(left, right) {
                        if !self.address_taken.contains(&name) {
                            non_null.insert_mut(name);
                        }
                    }
                }
            }
            _ => {}
        }
        non_null
    }

    /// Records the dereferences in expr whose pointer is known to be non null.
    fn record(&mut self, point: usize, expr: &Rc<Expr>, non_null: &NonNull) {
        let mut safe = Vec::new();
        expr.visit(&mut |e| {
            if let Expression::Dereference { pointer } = &e.expression {
                if let Expression::Symbol(symbol) = &pointer.expression {
                    if non_null.contains(&symbol.name) {
                        safe.push(Expr::new(e.expression.clone(), e.expr_type.clone()).l0());
                    }
                }
            }
        });
        if !safe.is_empty() {
            self.result
                .safe_dereferences
                .entry(point)
                .or_default()
                .extend(safe);
        }
    }
}

/// The name of the pointer variable that is compared with null, if any.
fn compared_with_null(left: &Rc<Expr>, right: &Rc<Expr>) -> Option<Rc<str>> {
    let is_null = |e: &Rc<Expr>| match &e.expression {
        Expression::Cast { operand } => operand.is_null() || operand.as_int_if_known() == Some(0),
        _ => e.is_null(),
    };
    let (pointer, other) = if is_null(right) {
        (left, right)
    } else {
        (right, left)
    };
    if !is_null(other) {
        return None;
    }
    match &pointer.expression {
        Expression::Symbol(symbol) if !symbol.is_field() => Some(symbol.name.clone()),
        _ => None,
    }
}

fn kill(mut non_null: NonNull, target: &Rc<Expr>) -> NonNull {
    if let Expression::Symbol(symbol) = &target.expression {
        non_null.remove_mut(&symbol.name);
    }
    non_null
}

fn intersect(a: &NonNull, b: &NonNull) -> NonNull {
    let mut result = a.clone();
    for pointer in a.iter() {
        if !b.contains(pointer) {
            result.remove_mut(pointer);
        }
    }
    result
}

fn collect_assigned(statement: &Statement, assigned: &mut HashSet<Rc<str>>) {
    let mut add = |e: &Rc<Expr>| {
        if let Expression::Symbol(symbol) = &e.expression {
            assigned.insert(symbol.name.clone());
        }
    };
    match &statement.kind {
        StatementKind::Declare { symbol, .. } | StatementKind::Input { symbol } => add(symbol),
        StatementKind::Assign { target, .. } => add(target),
        StatementKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            for s in then_branch.iter().chain(else_branch.iter()) {
                collect_assigned(s, assigned);
            }
        }
        StatementKind::While { body, .. } => {
            for s in body {
                collect_assigned(s, assigned);
            }
        }
        StatementKind::Return(..) => {}
    }
}

fn collect_address_taken(statement: &Statement, address_taken: &mut HashSet<Rc<str>>) {
    let mut scan = |e: &Rc<Expr>| {
        e.visit(&mut |e| {
            if let Expression::AddressOf { object } = &e.expression {
                for symbol in object.symbols() {
                    address_taken.insert(symbol.name.clone());
                }
            }
        })
    };
    match &statement.kind {
        StatementKind::Declare { init, .. } => {
            if let Some(init) = init {
                scan(init);
            }
        }
        StatementKind::Input { .. } => {}
        StatementKind::Assign { target, value } => {
            scan(target);
            scan(value);
        }
        StatementKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            scan(condition);
            for s in then_branch.iter().chain(else_branch.iter()) {
                collect_address_taken(s, address_taken);
            }
        }
        StatementKind::While { condition, body } => {
            scan(condition);
            for s in body {
                collect_address_taken(s, address_taken);
            }
        }
        StatementKind::Return(value) => {
            if let Some(value) = value {
                scan(value);
            }
        }
    }
}
