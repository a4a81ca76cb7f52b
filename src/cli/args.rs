//! Argument parsing for the `pgmatch` reads-matcher binary.
//!
//! The entry points are [`parse_args`] (reads `std::env::args()`) and
//! [`parse_args_from`] (takes an explicit slice, suitable for unit-testing).
//! Short options may be aggregated (`-re`) and value options accept the
//! value attached (`-m2`) or as the next argument (`-m 2`).  A bare `--`
//! ends option parsing.
//!
//! Bad or unrecognised options return an `Err` whose message begins with
//! `"bad usage: "`.

use anyhow::{anyhow, bail, Result};

/// Complete set of options and file arguments for one reads-matching run.
#[derive(Debug, Clone)]
pub struct ParsedArgs {
    /// Mismatch count the seeding is dimensioned for (`-m`).
    pub target_mismatches: u8,
    /// Mismatch budget a match may not exceed (`-M`; raised to `-m`).
    pub max_mismatches: u8,
    /// Early-exit threshold: reads matched at or below stop improving (`-n`).
    pub min_mismatches: u8,
    /// Match only this read prefix (`-p`); absent matches whole reads.
    pub match_prefix_length: Option<u16>,
    /// Also scan the reverse complement of the pseudogenome (`-r`).
    pub rev_compl_pg: bool,
    /// Use the complement of the reads division (`-c`).
    pub division_complement: bool,
    /// Reads division file (`-d`).
    pub division_file: Option<String>,
    /// ASCII-decimal numeric streams (`-t`).
    pub plain_text: bool,
    /// Dump the matched-offsets/missed/suffixes text bundle (`-i`).
    pub dump_info: bool,
    /// Absolute read positions instead of neighbor deltas (`-a`).
    pub absolute_positions: bool,
    /// Mismatch positions as reverse offsets from the read end (`-e`).
    pub rev_offset_mismatches: bool,

    pub reads_file: String,
    pub pair_file: Option<String>,
    pub pg_prefix: String,
    pub out_division_file: String,
    pub dest_pg_prefix: String,

    /// A help flag was processed; the caller should exit 0 without work.
    pub exit_early: bool,
}

impl Default for ParsedArgs {
    fn default() -> Self {
        ParsedArgs {
            target_mismatches: 0,
            max_mismatches: 0,
            min_mismatches: 0,
            match_prefix_length: None,
            rev_compl_pg: false,
            division_complement: false,
            division_file: None,
            plain_text: false,
            dump_info: false,
            absolute_positions: false,
            rev_offset_mismatches: false,
            reads_file: String::new(),
            pair_file: None,
            pg_prefix: String::new(),
            out_division_file: String::new(),
            dest_pg_prefix: String::new(),
            exit_early: false,
        }
    }
}

/// Prints the usage summary to stderr.
pub fn print_usage(exe_name: &str) {
    eprintln!(
        "Usage: {exe_name} [-r] [-m targetMaxMismatches] [-M allowedMaxMismatches] \
         [-n expectedMinMismatches]\n\
         [-p matchPrefixLength] [-a] [-e] [-t] [-i] [-c] [-d divisionFile]\n\
         readsSrcFile [pairSrcFile] pgFilePrefix outputDivisionFile destPgFilePrefix\n\n\
         -r match reverse complement of pseudogenome\n\
         -c use complement of reads division\n\
         -t write numbers in text mode\n\
         -i dump verbose matching info\n\
         -a write absolute read positions\n\
         -e write mismatches as offsets from end"
    );
}

/// Parses `std::env::args()` (skipping argv[0]).
pub fn parse_args(exe_name: &str) -> Result<ParsedArgs> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    parse_args_from(exe_name, &argv)
}

/// Parses an explicit argument list; callable from tests without touching
/// `std::env`.
pub fn parse_args_from(exe_name: &str, argv: &[String]) -> Result<ParsedArgs> {
    let mut args = ParsedArgs::default();
    let mut files: Vec<String> = Vec::new();
    let mut options_done = false;

    let mut iter = argv.iter().peekable();
    while let Some(arg) = iter.next() {
        if options_done || !arg.starts_with('-') || arg == "-" {
            files.push(arg.clone());
            continue;
        }
        if arg == "--" {
            options_done = true;
            continue;
        }
        let mut chars = arg[1..].char_indices();
        while let Some((ci, c)) = chars.next() {
            match c {
                'r' => args.rev_compl_pg = true,
                'c' => args.division_complement = true,
                't' => args.plain_text = true,
                'i' => args.dump_info = true,
                'a' => args.absolute_positions = true,
                'e' => args.rev_offset_mismatches = true,
                '?' | 'h' => {
                    print_usage(exe_name);
                    args.exit_early = true;
                    return Ok(args);
                }
                'm' | 'M' | 'n' | 'p' | 'd' => {
                    let attached = &arg[1 + ci + c.len_utf8()..];
                    let value: &str = if !attached.is_empty() {
                        attached
                    } else {
                        iter.next()
                            .ok_or_else(|| anyhow!("bad usage: option -{c} needs a value"))?
                    };
                    match c {
                        'm' => args.target_mismatches = parse_num(c, value)?,
                        'M' => args.max_mismatches = parse_num(c, value)?,
                        'n' => args.min_mismatches = parse_num(c, value)?,
                        'p' => args.match_prefix_length = Some(parse_num(c, value)?),
                        'd' => args.division_file = Some(value.to_owned()),
                        _ => unreachable!(),
                    }
                    break;
                }
                other => bail!("bad usage: unknown option -{other}"),
            }
        }
    }

    // validated against the raw -M value, before any raise
    if args.min_mismatches > args.max_mismatches {
        bail!(
            "min mismatches ({}) should not be higher than max mismatches ({})",
            args.min_mismatches,
            args.max_mismatches
        );
    }
    match files.len() {
        4 => {
            args.reads_file = files[0].clone();
            args.pg_prefix = files[1].clone();
            args.out_division_file = files[2].clone();
            args.dest_pg_prefix = files[3].clone();
        }
        5 => {
            args.reads_file = files[0].clone();
            args.pair_file = Some(files[1].clone());
            args.pg_prefix = files[2].clone();
            args.out_division_file = files[3].clone();
            args.dest_pg_prefix = files[4].clone();
        }
        n => {
            print_usage(exe_name);
            bail!("bad usage: expected 4 or 5 file arguments after options (found {n})");
        }
    }
    if args.max_mismatches < args.target_mismatches {
        eprintln!("INFO: allowed max mismatches raised to the target value.");
        args.max_mismatches = args.target_mismatches;
    }
    Ok(args)
}

fn parse_num<T: std::str::FromStr>(option: char, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("bad usage: invalid value {value:?} for option -{option}"))
}
