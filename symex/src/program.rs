// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::Result;
use crate::expression::Expr;
use crate::types::TypeTable;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// A single function, given as a typed statement tree. Programs are usually read from JSON files.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Program {
    pub name: String,
    #[serde(default)]
    pub types: TypeTable,
    pub body: Vec<Statement>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Statement {
    /// The position of this statement in a pre-order walk of the body of the program.
    #[serde(default)]
    pub point: usize,
    pub kind: StatementKind,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum StatementKind {
    /// Introduces a local variable, with an unknown value unless it is initialized.
    Declare {
        symbol: Rc<Expr>,
        init: Option<Rc<Expr>>,
    },
    /// Gives a variable a value that is not known. Input pointers point to fresh objects.
    Input { symbol: Rc<Expr> },
    Assign {
        target: Rc<Expr>,
        value: Rc<Expr>,
    },
    If {
        condition: Rc<Expr>,
        then_branch: Vec<Statement>,
        #[serde(default)]
        else_branch: Vec<Statement>,
    },
    While {
        condition: Rc<Expr>,
        body: Vec<Statement>,
    },
    Return(Option<Rc<Expr>>),
}

impl Program {
    pub fn new(name: &str, types: TypeTable, body: Vec<Statement>) -> Program {
        let mut program = Program {
            name: name.to_string(),
            types,
            body,
        };
        program.number_statements();
        program
    }

    pub fn from_json_str(json: &str) -> Result<Program> {
        let mut program: Program = serde_json::from_str(json)?;
        program.number_statements();
        Ok(program)
    }

    pub fn from_json_file(path: &Path) -> Result<Program> {
        let json = fs::read_to_string(path)?;
        Program::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn number_statements(&mut self) {
        fn number(statements: &mut [Statement], next: &mut usize) {
            for statement in statements.iter_mut() {
                statement.point = *next;
                *next += 1;
                match &mut statement.kind {
                    StatementKind::If {
                        then_branch,
                        else_branch,
                        ..
                    } => {
                        number(then_branch, next);
                        number(else_branch, next);
                    }
                    StatementKind::While { body, .. } => number(body, next),
                    _ => {}
                }
            }
        }
        let mut next = 0;
        number(&mut self.body, &mut next);
    }
}

impl Statement {
    pub fn new(kind: StatementKind) -> Statement {
        Statement { point: 0, kind }
    }

    pub fn declare(symbol: Rc<Expr>, init: Option<Rc<Expr>>) -> Statement {
        Statement::new(StatementKind::Declare { symbol, init })
    }

    pub fn input(symbol: Rc<Expr>) -> Statement {
        Statement::new(StatementKind::Input { symbol })
    }

    pub fn assign(target: Rc<Expr>, value: Rc<Expr>) -> Statement {
        Statement::new(StatementKind::Assign { target, value })
    }

    pub fn if_then_else(
        condition: Rc<Expr>,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    ) -> Statement {
        Statement::new(StatementKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn if_then(condition: Rc<Expr>, then_branch: Vec<Statement>) -> Statement {
        Statement::if_then_else(condition, then_branch, vec![])
    }

    pub fn while_loop(condition: Rc<Expr>, body: Vec<Statement>) -> Statement {
        Statement::new(StatementKind::While { condition, body })
    }

    pub fn ret(value: Option<Rc<Expr>>) -> Statement {
        Statement::new(StatementKind::Return(value))
    }
}
