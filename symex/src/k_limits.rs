// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Somewhat arbitrary constants used to limit things in the symbolic executor that may
// take too long or use too much memory.

/// The number of times the body of a loop is unwound on a single path.
pub const MAX_UNWIND_DEFAULT: usize = 1_000;

/// The number of paths that are explored for a single program before the rest are cut off.
pub const MAX_PATHS_DEFAULT: usize = 64;

/// Value sets with more entries than this are collapsed to "anything".
pub const MAX_VALUE_SET_ENTRIES: usize = 100;

/// If Expressions get too large, the simplifier stops trying to simplify them.
pub const MAX_EXPRESSION_SIZE: usize = 10_000;
