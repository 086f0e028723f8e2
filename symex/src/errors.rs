// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// The ways in which resolving an expression, or executing a program, can fail.
/// None of these are verification results: they abort the current path and indicate either a
/// construct that is not handled or a defect in the tool.
#[derive(Debug, Error)]
pub enum SymexError {
    /// An expression shape that the resolver does not know how to handle.
    #[error("unsupported construct `{kind}`: {expression}")]
    UnsupportedConstruct {
        kind: &'static str,
        expression: String,
    },

    /// An internal consistency check failed.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A points-to oracle returned no alternatives for a pointer.
    #[error("empty points-to set for {0}")]
    EmptyPointsToSet(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SymexError>;

impl SymexError {
    pub fn unsupported(kind: &'static str, expression: &dyn std::fmt::Display) -> SymexError {
        SymexError::UnsupportedConstruct {
            kind,
            expression: expression.to_string(),
        }
    }

    /// True if the error indicates a defect in the tool rather than a limitation.
    pub fn is_tool_defect(&self) -> bool {
        matches!(
            self,
            SymexError::InvariantViolation(..) | SymexError::EmptyPointsToSet(..)
        )
    }
}
