//! Binary entry point for the `pgmatch` reads-matcher tool.
//!
//! Maps a constant-length reads file onto a pseudogenome and writes the
//! separated output bundle plus the division of unmatched reads:
//!
//! 1. [`parse_args`] processes the option flags and file arguments;
//! 2. the reads source (optionally paired) is loaded and divided;
//! 3. [`map_reads_into_pg`] runs the matching pipeline and builds the
//!    output bundle under the destination prefix.
//!
//! Exit code 0 on success, non-zero with a stderr diagnostic on open or
//! parse failure.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use pgmatch::cli::args::{parse_args, ParsedArgs};
use pgmatch::cli::set_display_level;
use pgmatch::matching::reads_matcher::{map_reads_into_pg, MatchConfig};
use pgmatch::pg::output_builder::WriteOptions;
use pgmatch::reads::{apply_division, load_division, IndexesMapping, PlainReadsSet, ReadsSet};

fn run(args: ParsedArgs) -> Result<()> {
    let paired = args.pair_file.is_some();
    let source = match &args.pair_file {
        Some(pair) => PlainReadsSet::load_paired(Path::new(&args.reads_file), Path::new(pair))?,
        None => PlainReadsSet::load(Path::new(&args.reads_file))?,
    };

    let (reads, mapping) = match &args.division_file {
        Some(path) => {
            let division = load_division(Path::new(path))?;
            apply_division(&source, &division, args.division_complement)?
        }
        None => {
            let count = source.reads_count();
            (source, IndexesMapping::identity(count))
        }
    };

    let cfg = MatchConfig {
        rev_compl_pg: args.rev_compl_pg,
        match_prefix_length: args.match_prefix_length,
        target_mismatches: args.target_mismatches,
        max_mismatches: args.max_mismatches,
        min_mismatches: args.min_mismatches,
        interleaved_seeds: false,
    };
    let opts = WriteOptions {
        absolute_positions: args.absolute_positions,
        rev_offset_mismatches: args.rev_offset_mismatches,
        plain_text: args.plain_text,
        ..WriteOptions::default()
    };

    map_reads_into_pg(
        &args.pg_prefix,
        &reads,
        &mapping,
        &cfg,
        &opts,
        args.dump_info,
        &args.dest_pg_prefix,
        Path::new(&args.out_division_file),
        paired,
    )
    .with_context(|| format!("mapping reads onto {}", args.pg_prefix))?;
    Ok(())
}

fn main() -> ExitCode {
    let exe_name = std::env::args().next().unwrap_or_else(|| "pgmatch".to_owned());
    let args = match parse_args(&exe_name) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("pgmatch: {e}");
            return ExitCode::FAILURE;
        }
    };
    if args.exit_early {
        return ExitCode::SUCCESS;
    }
    if args.dump_info {
        set_display_level(3);
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pgmatch: {e:#}");
            ExitCode::FAILURE
        }
    }
}
