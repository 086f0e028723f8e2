// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Executes a program symbolically, one path at a time. Every expression is passed through
//! dereference resolution before it is evaluated or assigned, so the path state only ever sees
//! assignments to variables.

use crate::auto_objects;
use crate::collaborators::{AssignmentKind, Context, RenameLevel};
use crate::errors::{Result, SymexError};
use crate::expression::{Expr, Expression};
use crate::field_sensitivity;
use crate::options::Options;
use crate::path_state::PathState;
use crate::program::{Program, Statement, StatementKind};
use crate::resolver;
use crate::safety::LocalSafePointers;
use crate::types::ExpressionType;
use crate::valuation::ConcreteValue;

use log_derive::logfn_inputs;
use serde::Serialize;
use std::rc::Rc;

/// How a path came to an end.
#[derive(Serialize, Clone, Debug, Eq, PartialEq)]
pub enum Termination {
    /// A return statement with a value. The value is None if it is not known on the path.
    Returned(Option<ConcreteValue>),
    /// The end of the program was reached, or a return statement without a value.
    Completed,
    /// A loop was unwound the maximum number of times.
    UnwindingLimit,
    /// The path was cut off because the maximum number of paths had been reached.
    PathLimit,
    /// Resolution or execution failed. The path is abandoned.
    Aborted(String),
}

/// The result of executing one path, along with some statistics about it.
#[derive(Serialize, Clone, Debug)]
pub struct PathOutcome {
    pub termination: Termination,
    pub guard: String,
    pub trace_length: usize,
    pub hidden_assignments: usize,
    pub dereference_resolutions: usize,
    pub cache_entries: usize,
}

impl PathOutcome {
    fn new(state: &PathState, termination: Termination) -> PathOutcome {
        PathOutcome {
            termination,
            guard: state.guard.to_string(),
            trace_length: state.trace_length(),
            hidden_assignments: state.hidden_assignments,
            dereference_resolutions: state.dereference_resolutions,
            cache_entries: state.cache.len(),
        }
    }

    /// The exit code of a program that ends this way, if it is known.
    pub fn exit_code(&self) -> Option<i64> {
        match &self.termination {
            Termination::Returned(Some(value)) => value.as_int(),
            Termination::Completed => Some(0),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.termination, Termination::Aborted(..))
    }
}

enum Flow {
    Continue(PathState),
    Finished(PathOutcome),
}

fn aborted(state: &PathState, error: SymexError) -> Flow {
    if error.is_tool_defect() {
        warn!("path aborted: {}", error);
    } else {
        debug!("path aborted: {}", error);
    }
    Flow::Finished(PathOutcome::new(state, Termination::Aborted(error.to_string())))
}

#[derive(Debug)]
pub struct SymbolicExecutor {
    options: Options,
    paths: usize,
}

impl SymbolicExecutor {
    pub fn new(options: Options) -> SymbolicExecutor {
        SymbolicExecutor { options, paths: 0 }
    }

    /// Executes the program with the reference collaborators, using a safety analysis of the
    /// program itself.
    pub fn execute(&mut self, program: &Program) -> Vec<PathOutcome> {
        let ctx = Context::new(Rc::new(program.types.clone()), self.options.clone())
            .with_safety_oracle(Box::new(LocalSafePointers::analyze(program)));
        self.execute_in(&ctx, program)
    }

    /// Executes the program with the given collaborators. Returns one outcome per path.
    pub fn execute_in(&mut self, ctx: &Context, program: &Program) -> Vec<PathOutcome> {
        info!("executing {}", program.name);
        self.paths = 1;
        let state = PathState::new(&program.name);
        let outcomes: Vec<PathOutcome> = self
            .block(ctx, &program.body, state)
            .into_iter()
            .map(|flow| match flow {
                Flow::Continue(state) => PathOutcome::new(&state, Termination::Completed),
                Flow::Finished(outcome) => outcome,
            })
            .collect();
        for outcome in outcomes.iter() {
            info!(
                "{}: {:?} under {}",
                program.name, outcome.termination, outcome.guard
            );
        }
        outcomes
    }

    fn block(&mut self, ctx: &Context, statements: &[Statement], state: PathState) -> Vec<Flow> {
        let mut finished = Vec::new();
        let mut live = vec![state];
        for statement in statements {
            let mut next = Vec::new();
            for state in live {
                for flow in self.statement(ctx, statement, state) {
                    match flow {
                        Flow::Continue(state) => next.push(state),
                        flow => finished.push(flow),
                    }
                }
            }
            live = next;
            if live.is_empty() {
                break;
            }
        }
        finished.extend(live.into_iter().map(Flow::Continue));
        finished
    }

    fn statement(&mut self, ctx: &Context, statement: &Statement, mut state: PathState) -> Vec<Flow> {
        state.program_point = statement.point;
        match &statement.kind {
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let fallback = state.clone();
                let (condition, known) = match self.condition(ctx, &mut state, condition) {
                    Ok(result) => result,
                    Err(error) => return vec![aborted(&fallback, error)],
                };
                match known {
                    Some(true) => self.block(ctx, then_branch, state),
                    Some(false) => self.block(ctx, else_branch, state),
                    None => {
                        let mut else_state = state.clone();
                        else_state.add_to_guard(Expr::not(condition.clone()));
                        let mut then_state = state;
                        then_state.add_to_guard(condition);
                        let may_fork = self.may_fork();
                        let mut flows = self.block(ctx, then_branch, then_state);
                        if may_fork {
                            flows.extend(self.block(ctx, else_branch, else_state));
                        } else {
                            flows.push(Flow::Finished(PathOutcome::new(
                                &else_state,
                                Termination::PathLimit,
                            )));
                        }
                        flows
                    }
                }
            }
            StatementKind::While { condition, body } => {
                self.while_loop(ctx, statement.point, condition, body, state)
            }
            _ => {
                let fallback = state.clone();
                match self.simple_statement(ctx, statement, state) {
                    Ok(flow) => vec![flow],
                    Err(error) => vec![aborted(&fallback, error)],
                }
            }
        }
    }

    fn simple_statement(
        &mut self,
        ctx: &Context,
        statement: &Statement,
        mut state: PathState,
    ) -> Result<Flow> {
        match &statement.kind {
            StatementKind::Declare { symbol, init } => {
                state.declare_local(&declared_name(symbol)?);
                match init {
                    Some(init) => self.assign(ctx, &mut state, symbol, init)?,
                    None => {
                        let target = ctx.rename(&state, symbol, RenameLevel::L1);
                        for leaf in field_sensitivity::leaf_targets(&ctx.ns, &target) {
                            state.havoc_symbol(&leaf)?;
                        }
                    }
                }
            }
            StatementKind::Input { symbol } => {
                state.declare_local(&declared_name(symbol)?);
                self.input(ctx, &mut state, symbol)?;
            }
            StatementKind::Assign { target, value } => {
                self.assign(ctx, &mut state, target, value)?;
            }
            StatementKind::Return(Some(value)) => {
                let resolved = resolver::resolve(ctx, &mut state, value, false)?;
                let renamed = ctx.rename(&state, &resolved, RenameLevel::L2);
                let value = state.evaluate(ctx, &renamed);
                return Ok(Flow::Finished(PathOutcome::new(
                    &state,
                    Termination::Returned(value),
                )));
            }
            StatementKind::Return(None) => {
                return Ok(Flow::Finished(PathOutcome::new(
                    &state,
                    Termination::Completed,
                )));
            }
            StatementKind::If { .. } | StatementKind::While { .. } => {
                return Err(SymexError::InvariantViolation(format!(
                    "compound statement at {} executed as a simple statement",
                    statement.point
                )));
            }
        }
        Ok(Flow::Continue(state))
    }

    fn while_loop(
        &mut self,
        ctx: &Context,
        point: usize,
        condition: &Rc<Expr>,
        body: &[Statement],
        state: PathState,
    ) -> Vec<Flow> {
        let mut flows = Vec::new();
        let mut pending = vec![(state, 0usize)];
        while let Some((mut state, unwound)) = pending.pop() {
            state.program_point = point;
            if unwound >= self.options.max_unwind {
                debug!("unwinding limit reached at {}", point);
                flows.push(Flow::Finished(PathOutcome::new(
                    &state,
                    Termination::UnwindingLimit,
                )));
                continue;
            }
            let fallback = state.clone();
            let (condition, known) = match self.condition(ctx, &mut state, condition) {
                Ok(result) => result,
                Err(error) => {
                    flows.push(aborted(&fallback, error));
                    continue;
                }
            };
            let entering = match known {
                Some(true) => state,
                Some(false) => {
                    flows.push(Flow::Continue(state));
                    continue;
                }
                None => {
                    let mut exit_state = state.clone();
                    exit_state.add_to_guard(Expr::not(condition.clone()));
                    if self.may_fork() {
                        flows.push(Flow::Continue(exit_state));
                    } else {
                        flows.push(Flow::Finished(PathOutcome::new(
                            &exit_state,
                            Termination::PathLimit,
                        )));
                    }
                    let mut entering = state;
                    entering.add_to_guard(condition);
                    entering
                }
            };
            for flow in self.block(ctx, body, entering) {
                match flow {
                    Flow::Continue(state) => pending.push((state, unwound + 1)),
                    flow => flows.push(flow),
                }
            }
        }
        flows
    }

    /// Counts a new path, if the limit allows it.
    fn may_fork(&mut self) -> bool {
        if self.paths >= self.options.max_paths {
            debug!("path limit of {} reached", self.options.max_paths);
            return false;
        }
        self.paths += 1;
        true
    }

    /// Resolves and evaluates a condition. Returns the condition renamed to level 2, and its
    /// value if that is known.
    fn condition(
        &mut self,
        ctx: &Context,
        state: &mut PathState,
        condition: &Rc<Expr>,
    ) -> Result<(Rc<Expr>, Option<bool>)> {
        let resolved = resolver::resolve(ctx, state, condition, false)?;
        let renamed = ctx.simplify(&ctx.rename(state, &resolved, RenameLevel::L2));
        let known = state.evaluate(ctx, &renamed).and_then(|v| v.as_bool());
        Ok((renamed, known))
    }

    #[logfn_inputs(TRACE)]
    fn assign(
        &mut self,
        ctx: &Context,
        state: &mut PathState,
        target: &Rc<Expr>,
        value: &Rc<Expr>,
    ) -> Result<()> {
        let target = resolver::resolve(ctx, state, target, true)?;
        let value = resolver::resolve(ctx, state, value, false)?;
        self.assign_lvalue(ctx, state, &target, value, Expr::bool(true))
    }

    /// Assigns value to a resolved lvalue by reducing it to assignments to symbols.
    fn assign_lvalue(
        &mut self,
        ctx: &Context,
        state: &mut PathState,
        target: &Rc<Expr>,
        value: Rc<Expr>,
        guard: Rc<Expr>,
    ) -> Result<()> {
        match &target.expression {
            Expression::Symbol(..) => {
                ctx.recorder
                    .record(ctx, state, target, &value, &guard, AssignmentKind::State)
            }
            Expression::ConditionalExpression {
                condition,
                consequent,
                alternate,
            } => {
                let condition = ctx.simplify(&ctx.rename(state, condition, RenameLevel::L2));
                match state.evaluate(ctx, &condition).and_then(|v| v.as_bool()) {
                    Some(true) => self.assign_lvalue(ctx, state, consequent, value, guard),
                    Some(false) => self.assign_lvalue(ctx, state, alternate, value, guard),
                    None => {
                        let then_guard = conjoin(&guard, condition.clone());
                        let else_guard = conjoin(&guard, Expr::not(condition));
                        self.assign_lvalue(ctx, state, consequent, value.clone(), then_guard)?;
                        self.assign_lvalue(ctx, state, alternate, value, else_guard)
                    }
                }
            }
            Expression::Index { array, index } => {
                let updated = Expr::update(array.clone(), index.clone(), value);
                self.assign_lvalue(ctx, state, array, updated, guard)
            }
            Expression::Cast { operand } => {
                let value = Expr::cast(value, operand.expr_type.clone());
                self.assign_lvalue(ctx, state, operand, value, guard)
            }
            _ => Err(SymexError::unsupported(
                "assignment target",
                target.as_ref(),
            )),
        }
    }

    /// Gives the variable an unknown value. Pointers, including pointer fields of structs,
    /// point to objects of their own that are initialized lazily.
    fn input(&mut self, ctx: &Context, state: &mut PathState, symbol: &Rc<Expr>) -> Result<()> {
        let target = ctx.rename(state, symbol, RenameLevel::L1);
        for leaf in field_sensitivity::leaf_targets(&ctx.ns, &target) {
            let pointee = match leaf.expr_type.pointee() {
                Some(ExpressionType::Void) | None => {
                    state.havoc_symbol(&leaf)?;
                    continue;
                }
                Some(pointee) => pointee.clone(),
            };
            let name = match leaf.as_symbol() {
                Some(leaf_symbol) => leaf_symbol.l0().to_string(),
                None => return Err(SymexError::unsupported("input", leaf.as_ref())),
            };
            let object = auto_objects::input_object(&name, &pointee);
            ctx.recorder.record(
                ctx,
                state,
                &leaf,
                &Expr::address_of(object),
                &Expr::bool(true),
                AssignmentKind::State,
            )?;
        }
        Ok(())
    }
}

fn conjoin(guard: &Rc<Expr>, condition: Rc<Expr>) -> Rc<Expr> {
    match guard.as_bool_if_known() {
        Some(true) => condition,
        _ => Expr::and(guard.clone(), condition),
    }
}

fn declared_name(symbol: &Rc<Expr>) -> Result<Rc<str>> {
    match &symbol.expression {
        Expression::Symbol(symbol) if !symbol.is_field() => Ok(symbol.name.clone()),
        _ => Err(SymexError::unsupported("declaration", symbol.as_ref())),
    }
}
