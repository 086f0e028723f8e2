// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::collaborators::{AssignmentKind, Context, RenameLevel};
use crate::errors::{Result, SymexError};
use crate::expression::{Expr, Expression, Symbol};
use crate::points_to::{self, ValueSet};
use crate::subexpression_cache::SubexpressionCache;
use crate::valuation::{self, ConcreteValue};

use log_derive::logfn_inputs;
use mirai_annotations::*;
use rpds::{HashTrieMap, HashTrieSet, Vector};
use serde::Serialize;
use std::rc::Rc;

/// A single entry of the trace of a path.
#[derive(Serialize, Clone, Debug, Eq, PartialEq)]
pub struct TraceStep {
    pub target: Rc<Expr>,
    pub value: Rc<Expr>,
    pub guard: Rc<Expr>,
    pub kind: AssignmentKind,
}

/// Everything that is known about one path through a program. Cloning a state forks the path:
/// all collections are persistent, so the clone shares structure with the original until either
/// of them is updated.
#[derive(Clone, Debug)]
pub struct PathState {
    /// The function whose body is being executed.
    pub function_id: Rc<str>,
    /// The statement being executed.
    pub program_point: usize,
    /// The activation level of the current function.
    pub frame: u32,
    pub active_threads: usize,
    /// The condition under which this path is taken.
    pub guard: Rc<Expr>,
    pub cache: SubexpressionCache,
    pub dereference_resolutions: usize,
    pub hidden_assignments: usize,
    // level 0 names of the locals of the current frame
    locals: HashTrieSet<Rc<str>>,
    // level 1 key -> current version
    versions: HashTrieMap<Rc<str>, u32>,
    // level 1 key of a pointer (or "key[]" for the elements of an array of pointers) -> value set
    value_sets: HashTrieMap<Rc<str>, ValueSet>,
    // level 2 name -> concrete value, for the symbols whose value is known
    valuation: HashTrieMap<Rc<str>, ConcreteValue>,
    trace: Vector<TraceStep>,
    // object keys of auto objects that have been initialized
    initialized_auto_objects: HashTrieSet<Rc<str>>,
    fresh_counter: usize,
}

impl PathState {
    pub fn new(function_id: &str) -> PathState {
        PathState {
            function_id: Rc::from(function_id),
            program_point: 0,
            frame: 0,
            active_threads: 1,
            guard: Expr::bool(true),
            cache: SubexpressionCache::default(),
            dereference_resolutions: 0,
            hidden_assignments: 0,
            locals: HashTrieSet::new(),
            versions: HashTrieMap::new(),
            value_sets: HashTrieMap::new(),
            valuation: HashTrieMap::new(),
            trace: Vector::new(),
            initialized_auto_objects: HashTrieSet::new(),
            fresh_counter: 0,
        }
    }

    /// Makes name refer to a local of the current frame.
    pub fn declare_local(&mut self, name: &Rc<str>) {
        self.locals.insert_mut(name.clone());
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains(name)
    }

    /// The current version of the level 1 variable with the given key. Variables that have
    /// never been assigned are at version 0.
    pub fn current_version(&self, l1_key: &str) -> u32 {
        self.versions.get(l1_key).copied().unwrap_or(0)
    }

    pub fn value_set(&self, key: &str) -> Option<&ValueSet> {
        self.value_sets.get(key)
    }

    pub fn value_of(&self, l2_name: &str) -> Option<&ConcreteValue> {
        self.valuation.get(l2_name)
    }

    pub fn trace(&self) -> impl Iterator<Item = &TraceStep> {
        self.trace.iter()
    }

    pub fn trace_length(&self) -> usize {
        self.trace.len()
    }

    /// Returns a name with the given prefix that has not been returned before on this path.
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        self.fresh_counter += 1;
        format!("{}{}", prefix, self.fresh_counter)
    }

    pub fn is_auto_object_initialized(&self, object_key: &str) -> bool {
        self.initialized_auto_objects.contains(object_key)
    }

    pub fn mark_auto_object_initialized(&mut self, object_key: Rc<str>) {
        self.initialized_auto_objects.insert_mut(object_key);
    }

    /// Conjoins the condition to the path guard.
    pub fn add_to_guard(&mut self, condition: Rc<Expr>) {
        self.guard = match self.guard.as_bool_if_known() {
            Some(true) => condition,
            _ => Expr::and(self.guard.clone(), condition),
        };
    }

    /// Evaluates an expression that has been renamed to level 2. None means the value is not
    /// known on this path.
    pub fn evaluate(&self, ctx: &Context, expr: &Rc<Expr>) -> Option<ConcreteValue> {
        valuation::evaluate(self, &ctx.ns, expr)
    }

    /// The single entry point for writes to program state. Assigns value (renamed to level 1)
    /// to the atomic level 1 symbol target: advances the version of target, updates its value
    /// set and its concrete value, appends the assignment to the trace and evicts every cache
    /// entry that depends on the root object of target.
    #[logfn_inputs(TRACE)]
    pub fn assign_symbol(
        &mut self,
        ctx: &Context,
        target: &Rc<Expr>,
        value: &Rc<Expr>,
        guard: &Rc<Expr>,
        kind: AssignmentKind,
    ) -> Result<()> {
        let symbol = match &target.expression {
            Expression::Symbol(symbol) => symbol.l1(),
            _ => {
                return Err(SymexError::InvariantViolation(format!(
                    "assignment to non symbol {}",
                    target
                )));
            }
        };
        checked_precondition!(!value.contains_dereference());
        let l1_key = symbol.l1_key();

        // Guarded assignments are merged with the previous value.
        let value = match guard.as_bool_if_known() {
            Some(true) => value.clone(),
            _ => Expr::conditional(
                guard.clone(),
                value.clone(),
                Expr::from_symbol(symbol.clone(), target.expr_type.clone()),
            ),
        };

        self.update_value_set(ctx, &symbol, target, &value);
        let rhs = ctx.rename(self, &value, RenameLevel::L2);
        let concrete = self.evaluate(ctx, &rhs);

        let version = self.current_version(&l1_key) + 1;
        self.versions.insert_mut(l1_key, version);
        let l2_target = Symbol {
            version: Some(version),
            ..symbol.clone()
        };
        let l2_name: Rc<str> = Rc::from(l2_target.to_string().as_str());
        match concrete {
            Some(concrete) => {
                trace!("{} := {:?}", l2_name, concrete);
                self.valuation.insert_mut(l2_name, concrete);
            }
            None => {
                trace!("{} := {} (symbolic)", l2_name, rhs);
            }
        }
        if kind == AssignmentKind::Hidden {
            self.hidden_assignments += 1;
        }
        self.trace.push_back_mut(TraceStep {
            target: Expr::from_symbol(l2_target, target.expr_type.clone()),
            value: rhs,
            guard: guard.clone(),
            kind,
        });

        let evicted = self.cache.invalidate(&symbol.object_key());
        if evicted > 0 {
            debug!(
                "assignment to {} evicted {} cached dereferences",
                symbol, evicted
            );
        }
        Ok(())
    }

    /// Records a fresh, unconstrained value for the target, as when reading an input.
    pub fn havoc_symbol(&mut self, target: &Rc<Expr>) -> Result<()> {
        let symbol = match &target.expression {
            Expression::Symbol(symbol) => symbol.l1(),
            _ => {
                return Err(SymexError::InvariantViolation(format!(
                    "havoc of non symbol {}",
                    target
                )));
            }
        };
        let l1_key = symbol.l1_key();
        let version = self.current_version(&l1_key) + 1;
        self.versions.insert_mut(l1_key.clone(), version);
        if target.expr_type.is_pointer() {
            self.value_sets.insert_mut(l1_key, ValueSet::unknown());
        }
        self.cache.invalidate(&symbol.object_key());
        Ok(())
    }

    fn update_value_set(
        &mut self,
        ctx: &Context,
        symbol: &Symbol,
        target: &Rc<Expr>,
        value: &Rc<Expr>,
    ) {
        let t = &target.expr_type;
        if t.is_pointer() {
            let set = points_to::value_set_of(&ctx.ns, self, value);
            self.value_sets.insert_mut(symbol.l1_key(), set);
        } else if t.element().map(|e| e.is_pointer()).unwrap_or(false) {
            // The elements of an array of pointers share one weakly updated value set.
            let key = points_to::element_summary_key(symbol);
            let mut set = self.value_sets.get(&key).cloned().unwrap_or_default();
            for element in stored_elements(value) {
                set = set.union(&points_to::value_set_of(&ctx.ns, self, &element));
            }
            self.value_sets.insert_mut(key, set);
        }
    }
}

/// The expressions that an array valued expression stores into array elements, other than the
/// elements it copies from another array value.
fn stored_elements(value: &Rc<Expr>) -> Vec<Rc<Expr>> {
    match &value.expression {
        Expression::ArrayLiteral { elements } => elements.clone(),
        Expression::Update { array, value, .. } => {
            let mut result = stored_elements(array);
            result.push(value.clone());
            result
        }
        Expression::ConditionalExpression {
            consequent,
            alternate,
            ..
        } => {
            let mut result = stored_elements(consequent);
            result.extend(stored_elements(alternate));
            result
        }
        Expression::Index { .. } | Expression::Symbol(..) => {
            // A copy of another array of pointers.
            vec![Expr::index(value.clone(), Expr::offset(0))]
        }
        _ => vec![],
    }
}
