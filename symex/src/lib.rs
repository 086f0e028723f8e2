// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Pointer dereference resolution for a symbolic executor. Expressions that read or write
//! through pointers are rewritten into case splits over the objects the pointers may point to,
//! with address arithmetic in a canonical form, and repeated dereferences of pointers that have
//! not changed on the current path are cached in auxiliary variables.

#[macro_use]
extern crate log;

pub mod address_arithmetic;
pub mod auto_objects;
pub mod collaborators;
pub mod dereference;
pub mod errors;
pub mod expression;
pub mod field_sensitivity;
pub mod k_limits;
pub mod object_descriptor;
pub mod options;
pub mod path_state;
pub mod points_to;
pub mod program;
pub mod renaming;
pub mod resolver;
pub mod safety;
pub mod simplifier;
pub mod subexpression_cache;
pub mod symex;
pub mod trace;
pub mod types;
pub mod valuation;
