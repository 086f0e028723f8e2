// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The services that dereference resolution relies on but does not implement itself.
//! Each trait has a reference implementation elsewhere in this crate, and a `Context` bundles
//! one implementation of each together with the type table and the options.

use crate::auto_objects::AutoObjects;
use crate::errors::Result;
use crate::expression::Expr;
use crate::field_sensitivity::FieldSensitivity;
use crate::options::Options;
use crate::path_state::PathState;
use crate::points_to::ValueSetDereference;
use crate::renaming::SsaRenamer;
use crate::safety::LocalSafePointers;
use crate::simplifier::ExprSimplifier;
use crate::trace::TraceRecorder;
use crate::types::TypeTable;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::rc::Rc;

/// One of the objects a pointer may point to, along with the condition under which it does.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alternative {
    pub guard: Rc<Expr>,
    pub object: Rc<Expr>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RenameLevel {
    /// Qualify local variables with the frame of the current function activation.
    L1,
    /// Additionally qualify every variable with its current assignment version.
    L2,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AssignmentKind {
    /// An assignment that appears in the program.
    State,
    /// An assignment introduced by the executor itself, for instance to name a resolved dereference.
    Hidden,
}

/// Decides which objects a pointer may point to.
pub trait PointsToOracle: Debug {
    /// Returns a non empty list of alternatives. If the pointer may be invalid, the last
    /// alternative has guard true and a failed object as its object. The pointer must already be
    /// free of dereferences and renamed to level 1.
    fn resolve_pointer(
        &self,
        ns: &TypeTable,
        state: &PathState,
        pointer: &Rc<Expr>,
        allow_fast_path_if_safe: bool,
    ) -> Result<Vec<Alternative>>;
}

/// Knows which dereferences are guaranteed to be valid at a program point.
pub trait SafetyOracle: Debug {
    /// The dereference is given with every symbol reduced to level 0.
    fn is_always_valid(&self, dereference: &Rc<Expr>, function: &str, point: usize) -> bool;
}

/// Qualifies symbols with frame and version information. Renaming is idempotent.
pub trait Renamer: Debug {
    fn rename(&self, state: &PathState, expr: &Rc<Expr>, level: RenameLevel) -> Rc<Expr>;
}

/// Turns member accesses of struct variables into symbols of their own.
pub trait FieldDecomposer: Debug {
    fn decompose(&self, ns: &TypeTable, expr: &Rc<Expr>, write: bool) -> Rc<Expr>;
}

/// Best effort algebraic simplification. Never introduces a dereference.
pub trait Simplifier: Debug {
    fn simplify(&self, expr: &Rc<Expr>) -> Rc<Expr>;
}

/// Appends assignments to the trace of the current path.
pub trait AssignmentRecorder: Debug {
    fn record(
        &self,
        ctx: &Context,
        state: &mut PathState,
        target: &Rc<Expr>,
        value: &Rc<Expr>,
        guard: &Rc<Expr>,
        kind: AssignmentKind,
    ) -> Result<()>;
}

/// Gives the objects that inputs of pointer type point to their initial values, the first time
/// they are dereferenced on a path.
pub trait AutoObjectInitializer: Debug {
    fn initialize_if_fresh(
        &self,
        ctx: &Context,
        state: &mut PathState,
        object: &Rc<Expr>,
    ) -> Result<()>;
}

/// Everything dereference resolution needs, other than the state of the current path.
#[derive(Debug)]
pub struct Context {
    pub ns: Rc<TypeTable>,
    pub options: Options,
    pub points_to: Box<dyn PointsToOracle>,
    pub safety: Box<dyn SafetyOracle>,
    pub renamer: Box<dyn Renamer>,
    pub field_sensitivity: Box<dyn FieldDecomposer>,
    pub simplifier: Box<dyn Simplifier>,
    pub recorder: Box<dyn AssignmentRecorder>,
    pub auto_objects: Box<dyn AutoObjectInitializer>,
}

impl Context {
    /// A context that uses the reference implementation of every service and knows of no
    /// dereferences that are always safe.
    pub fn new(ns: Rc<TypeTable>, options: Options) -> Context {
        Context {
            ns,
            options,
            points_to: Box::new(ValueSetDereference::default()),
            safety: Box::new(LocalSafePointers::default()),
            renamer: Box::new(SsaRenamer::default()),
            field_sensitivity: Box::new(FieldSensitivity::default()),
            simplifier: Box::new(ExprSimplifier::default()),
            recorder: Box::new(TraceRecorder::default()),
            auto_objects: Box::new(AutoObjects::default()),
        }
    }

    pub fn with_safety_oracle(mut self, safety: Box<dyn SafetyOracle>) -> Context {
        self.safety = safety;
        self
    }

    pub fn with_points_to_oracle(mut self, points_to: Box<dyn PointsToOracle>) -> Context {
        self.points_to = points_to;
        self
    }

    pub fn with_simplifier(mut self, simplifier: Box<dyn Simplifier>) -> Context {
        self.simplifier = simplifier;
        self
    }

    pub fn with_recorder(mut self, recorder: Box<dyn AssignmentRecorder>) -> Context {
        self.recorder = recorder;
        self
    }

    pub fn rename(&self, state: &PathState, expr: &Rc<Expr>, level: RenameLevel) -> Rc<Expr> {
        self.renamer.rename(state, expr, level)
    }

    pub fn decompose(&self, expr: &Rc<Expr>, write: bool) -> Rc<Expr> {
        self.field_sensitivity.decompose(&self.ns, expr, write)
    }

    pub fn simplify(&self, expr: &Rc<Expr>) -> Rc<Expr> {
        self.simplifier.simplify(expr)
    }
}
