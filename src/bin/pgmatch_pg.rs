//! Binary entry point for the `pgmatch-pg` pseudogenome-vs-pseudogenome
//! matcher.
//!
//! Collapses long repeats: the good pseudogenome is first matched against
//! itself, then the bad one is expressed in terms of the good sequence.
//! Each rewritten `.pg` file carries the copy sentinel plus the
//! `_map_off.pg` / `_map_len.pg` side streams.

use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};

use pgmatch::matching::pg_matcher::{match_pg_in_pg_files, DEFAULT_MIN_MATCH_LENGTH};

struct PgArgs {
    min_match_length: usize,
    rev_compl: bool,
    plain_text: bool,
    good_pg_prefix: String,
    bad_pg_prefix: String,
    exit_early: bool,
}

fn print_usage(exe_name: &str) {
    eprintln!(
        "Usage: {exe_name} [-r] [-t] [-l minMatchLength] goodPgPrefix badPgPrefix\n\n\
         -r match reverse complement of the target\n\
         -t write numbers in text mode\n\
         -l minimal substring length worth a copy directive (default {DEFAULT_MIN_MATCH_LENGTH})"
    );
}

fn parse_args(exe_name: &str, argv: &[String]) -> Result<PgArgs> {
    let mut args = PgArgs {
        min_match_length: DEFAULT_MIN_MATCH_LENGTH,
        rev_compl: false,
        plain_text: false,
        good_pg_prefix: String::new(),
        bad_pg_prefix: String::new(),
        exit_early: false,
    };
    let mut files: Vec<String> = Vec::new();
    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-r" => args.rev_compl = true,
            "-t" => args.plain_text = true,
            "-l" => {
                let value = iter.next().ok_or_else(|| anyhow!("bad usage: -l needs a value"))?;
                args.min_match_length = value
                    .parse()
                    .map_err(|_| anyhow!("bad usage: invalid value {value:?} for -l"))?;
                if args.min_match_length == 0 {
                    bail!("bad usage: minimal match length must be positive");
                }
            }
            "-?" | "-h" => {
                print_usage(exe_name);
                args.exit_early = true;
                return Ok(args);
            }
            other if other.starts_with('-') => bail!("bad usage: unknown option {other}"),
            other => files.push(other.to_owned()),
        }
    }
    if files.len() != 2 {
        print_usage(exe_name);
        bail!("bad usage: expected 2 pseudogenome prefixes (found {})", files.len());
    }
    args.good_pg_prefix = files.remove(0);
    args.bad_pg_prefix = files.remove(0);
    Ok(args)
}

fn main() -> ExitCode {
    let exe_name = std::env::args().next().unwrap_or_else(|| "pgmatch-pg".to_owned());
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&exe_name, &argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("pgmatch-pg: {e}");
            return ExitCode::FAILURE;
        }
    };
    if args.exit_early {
        return ExitCode::SUCCESS;
    }
    match match_pg_in_pg_files(
        &args.good_pg_prefix,
        &args.bad_pg_prefix,
        args.min_match_length,
        args.rev_compl,
        args.plain_text,
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pgmatch-pg: {e}");
            ExitCode::FAILURE
        }
    }
}
