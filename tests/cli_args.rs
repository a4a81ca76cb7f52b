// Integration tests for the reads-matcher argument parser.

use pgmatch::cli::args::parse_args_from;

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn four_file_form() {
    let args =
        parse_args_from("pgmatch", &argv(&["reads.txt", "pg", "div.out", "dest"])).unwrap();
    assert_eq!(args.reads_file, "reads.txt");
    assert_eq!(args.pair_file, None);
    assert_eq!(args.pg_prefix, "pg");
    assert_eq!(args.out_division_file, "div.out");
    assert_eq!(args.dest_pg_prefix, "dest");
}

#[test]
fn five_file_form_takes_pair_source() {
    let args = parse_args_from(
        "pgmatch",
        &argv(&["reads_1.txt", "reads_2.txt", "pg", "div.out", "dest"]),
    )
    .unwrap();
    assert_eq!(args.pair_file.as_deref(), Some("reads_2.txt"));
}

#[test]
fn value_options_attached_and_detached() {
    let args = parse_args_from(
        "pgmatch",
        &argv(&["-m2", "-M", "4", "-n1", "-p", "60", "-d", "div.in", "r", "pg", "o", "d"]),
    )
    .unwrap();
    assert_eq!(args.target_mismatches, 2);
    assert_eq!(args.max_mismatches, 4);
    assert_eq!(args.min_mismatches, 1);
    assert_eq!(args.match_prefix_length, Some(60));
    assert_eq!(args.division_file.as_deref(), Some("div.in"));
}

#[test]
fn aggregated_flags() {
    let args = parse_args_from("pgmatch", &argv(&["-rceit", "-a", "r", "pg", "o", "d"])).unwrap();
    assert!(args.rev_compl_pg);
    assert!(args.division_complement);
    assert!(args.rev_offset_mismatches);
    assert!(args.dump_info);
    assert!(args.plain_text);
    assert!(args.absolute_positions);
}

#[test]
fn options_after_files_still_parse() {
    let args = parse_args_from("pgmatch", &argv(&["r", "pg", "o", "d", "-r"])).unwrap();
    assert!(args.rev_compl_pg);
    assert_eq!(args.reads_file, "r");
}

#[test]
fn double_dash_ends_options() {
    let args = parse_args_from("pgmatch", &argv(&["--", "-r", "pg", "o", "d"])).unwrap();
    assert!(!args.rev_compl_pg);
    assert_eq!(args.reads_file, "-r");
}

#[test]
fn allowed_max_is_raised_to_target() {
    let args = parse_args_from("pgmatch", &argv(&["-m3", "-M1", "r", "pg", "o", "d"])).unwrap();
    assert_eq!(args.max_mismatches, 3);
}

#[test]
fn min_above_max_is_rejected() {
    let err = parse_args_from("pgmatch", &argv(&["-n3", "-M1", "r", "pg", "o", "d"])).unwrap_err();
    assert!(err.to_string().contains("min mismatches"));
}

#[test]
fn min_is_checked_against_the_raw_allowed_max() {
    // the raise of -M to -m happens after validation, so a raw allowed max
    // of 0 rejects a higher min even when the target would cover it
    let err = parse_args_from("pgmatch", &argv(&["-m5", "-n3", "r", "pg", "o", "d"])).unwrap_err();
    assert!(err.to_string().contains("min mismatches"));
}

#[test]
fn wrong_arity_is_rejected() {
    let err = parse_args_from("pgmatch", &argv(&["only", "three", "files"])).unwrap_err();
    assert!(err.to_string().starts_with("bad usage"));
    let err = parse_args_from("pgmatch", &argv(&["a", "b", "c", "d", "e", "f"])).unwrap_err();
    assert!(err.to_string().starts_with("bad usage"));
}

#[test]
fn unknown_option_is_rejected() {
    let err = parse_args_from("pgmatch", &argv(&["-z", "r", "pg", "o", "d"])).unwrap_err();
    assert!(err.to_string().starts_with("bad usage"));
}

#[test]
fn bad_numeric_value_is_rejected() {
    let err = parse_args_from("pgmatch", &argv(&["-m", "lots", "r", "pg", "o", "d"])).unwrap_err();
    assert!(err.to_string().starts_with("bad usage"));
}

#[test]
fn help_exits_early() {
    let args = parse_args_from("pgmatch", &argv(&["-?"])).unwrap();
    assert!(args.exit_early);
}
