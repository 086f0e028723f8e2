// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use serde::Serialize;
use std::env;
use std::path::Path;
use symex::errors::SymexError;
use symex::options::Options;
use symex::program::Program;
use symex::symex::{PathOutcome, SymbolicExecutor};

#[derive(Serialize)]
struct Report<'a> {
    program: &'a str,
    outcomes: &'a [PathOutcome],
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize loggers.
    if env::var("SYMEX_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("SYMEX_LOG")
            .write_style("SYMEX_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    // Options come from SYMEX_FLAGS first, then from the command line.
    let mut options = Options::default();
    if let Ok(flags) = env::var("SYMEX_FLAGS") {
        options.parse_from_str(&flags)?;
    }
    let command_line_arguments: Vec<String> = env::args().skip(1).collect();
    options.parse(&command_line_arguments)?;
    if options.programs.is_empty() {
        return Err(SymexError::InvalidOptions(String::from("no program files given")).into());
    }

    let mut any_aborted = false;
    for file_name in options.programs.iter() {
        let program = Program::from_json_file(Path::new(file_name))?;
        let mut executor = SymbolicExecutor::new(options.clone());
        let outcomes = executor.execute(&program);
        any_aborted |= outcomes.iter().any(|o| o.is_aborted());
        let report = Report {
            program: file_name,
            outcomes: &outcomes,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    std::process::exit(any_aborted as i32);
}
