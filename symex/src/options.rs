// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{Result, SymexError};
use crate::k_limits;

use clap::{Arg, ArgAction, Command};
use itertools::Itertools;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command {
    Command::new("symex")
        .no_binary_name(true)
        .version("v0.1.0")
        .arg(Arg::new("no_dereference_cache")
            .long("no-dereference-cache")
            .action(ArgAction::SetTrue)
            .help("Resolve every dereference afresh instead of reusing earlier resolutions."))
        .arg(Arg::new("validate")
            .long("validate")
            .action(ArgAction::SetTrue)
            .help("Run internal consistency checks after every rewrite step."))
        .arg(Arg::new("show_points_to_sets")
            .long("show-points-to-sets")
            .action(ArgAction::SetTrue)
            .help("Log the objects each dereferenced pointer may point to."))
        .arg(Arg::new("max_unwind")
            .long("max-unwind")
            .value_parser(clap::value_parser!(usize))
            .help("The number of times a loop body is unwound on a single path.")
            .long_help("The default is 1000."))
        .arg(Arg::new("max_paths")
            .long("max-paths")
            .value_parser(clap::value_parser!(usize))
            .help("The maximum number of paths explored per program.")
            .long_help("The default is 64."))
        .arg(Arg::new("programs")
            .num_args(0..)
            .help("JSON files containing the programs to execute."))
}

/// Represents options passed to the symbolic executor.
#[derive(Clone, Debug)]
pub struct Options {
    pub dereference_cache: bool,
    pub run_validation_checks: bool,
    pub show_points_to_sets: bool,
    pub max_unwind: usize,
    pub max_paths: usize,
    pub programs: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            dereference_cache: true,
            run_validation_checks: false,
            show_points_to_sets: false,
            max_unwind: k_limits::MAX_UNWIND_DEFAULT,
            max_paths: k_limits::MAX_PATHS_DEFAULT,
            programs: vec![],
        }
    }
}

impl Options {
    /// Parse options from an argument string. The argument string will be split using unix
    /// shell escaping rules.
    pub fn parse_from_str(&mut self, s: &str) -> Result<()> {
        let args = shellwords::split(s).map_err(|e| {
            SymexError::InvalidOptions(format!("Cannot parse argument string: {:?}", e))
        })?;
        self.parse(&args)
    }

    /// Parses options from a list of strings. Only the options that are present change self.
    pub fn parse(&mut self, args: &[String]) -> Result<()> {
        let matches = make_options_parser()
            .try_get_matches_from(args.iter())
            .map_err(|e| SymexError::InvalidOptions(e.to_string()))?;

        if matches.get_flag("no_dereference_cache") {
            self.dereference_cache = false;
        }
        if matches.get_flag("validate") {
            self.run_validation_checks = true;
        }
        if matches.get_flag("show_points_to_sets") {
            self.show_points_to_sets = true;
        }
        if let Some(max_unwind) = matches.get_one::<usize>("max_unwind") {
            self.max_unwind = *max_unwind;
        }
        if let Some(max_paths) = matches.get_one::<usize>("max_paths") {
            self.max_paths = *max_paths;
        }
        if let Some(programs) = matches.get_many::<String>("programs") {
            self.programs.extend(programs.cloned());
        }
        if let Some(duplicate) = self.programs.iter().duplicates().next() {
            return Err(SymexError::InvalidOptions(format!(
                "{} is given more than once",
                duplicate
            )));
        }
        Ok(())
    }
}

