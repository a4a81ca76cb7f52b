// Integration tests for the pseudogenome-vs-pseudogenome matcher and the
// copy-directive rewrite.
//
// Coverage:
//   - seed + extend finds a whole embedded repeat (exact stream bytes)
//   - restoring literal runs + directives reproduces the target
//   - same-text matching with the source/destination swap
//   - reverse-complement matching with the coordinate rewrite
//   - matches shorter than the minimum are not rewritten

use std::fs;

use pgmatch::matching::pg_matcher::{match_pg_in_pg_files, restore_matched_pg, PgMatcher};
use pgmatch::pg::persistence::{
    PSEUDOGENOME_FILE_SUFFIX, PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX,
    PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX,
};
use pgmatch::seq::{reverse_complement, MATCH_MARK};
use tempfile::TempDir;

fn write_pg(dir: &TempDir, prefix: &str, pg: &[u8]) -> String {
    let full = dir.path().join(prefix).to_string_lossy().into_owned();
    pgmatch::pg::persistence::write_pseudo_genome_sequence(pg, &full).unwrap();
    full
}

fn read_element(prefix: &str, suffix: &str) -> Vec<u8> {
    fs::read(format!("{prefix}{suffix}")).unwrap()
}

#[test]
fn embedded_repeat_becomes_one_directive() {
    let dir = TempDir::new().unwrap();
    let src = b"ACGTACGT".to_vec();
    let dest = b"XXACGTACGTYY";
    let dest_prefix = write_pg(&dir, "dest", dest);

    let matcher = PgMatcher::with_sequence("src", src.clone(), 6);
    matcher.mark_and_remove_exact_matches(&dest_prefix, false, false).unwrap();

    let rewritten = read_element(&dest_prefix, PSEUDOGENOME_FILE_SUFFIX);
    assert_eq!(rewritten, [b'X', b'X', MATCH_MARK, b'Y', b'Y']);
    let map_off = read_element(&dest_prefix, PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX);
    assert_eq!(map_off, 0u32.to_le_bytes());
    let map_len = read_element(&dest_prefix, PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX);
    assert_eq!(map_len, [2]); // 8 - 6, byte-frugal

    let restored = restore_matched_pg(&dest_prefix, &src, 6, false, false).unwrap();
    assert_eq!(restored, dest);
}

#[test]
fn below_minimum_matches_stay_literal() {
    let dir = TempDir::new().unwrap();
    let src = b"ACGTACGT".to_vec();
    let dest = b"XXACGTYY";
    let dest_prefix = write_pg(&dir, "dest", dest);

    let matcher = PgMatcher::with_sequence("src", src, 6);
    matcher.mark_and_remove_exact_matches(&dest_prefix, false, false).unwrap();

    let rewritten = read_element(&dest_prefix, PSEUDOGENOME_FILE_SUFFIX);
    assert_eq!(rewritten, dest);
    assert!(read_element(&dest_prefix, PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX).is_empty());
}

#[test]
fn same_text_repeat_collapses_and_restores() {
    let dir = TempDir::new().unwrap();
    let unit = b"ACGTACGTACGT";
    let mut pg = Vec::new();
    pg.extend_from_slice(b"TTTT");
    pg.extend_from_slice(unit);
    pg.extend_from_slice(b"GGGG");
    pg.extend_from_slice(unit);
    pg.extend_from_slice(b"CCCC");
    let prefix = write_pg(&dir, "self", &pg);

    let matcher = PgMatcher::new(&prefix, 8).unwrap();
    matcher.mark_and_remove_exact_matches(&prefix, false, false).unwrap();

    let rewritten = read_element(&prefix, PSEUDOGENOME_FILE_SUFFIX);
    assert!(rewritten.len() < pg.len(), "no repeat was collapsed");
    assert!(rewritten.contains(&MATCH_MARK));

    let restored = restore_matched_pg(&prefix, matcher.source_pg(), 8, false, false).unwrap();
    assert_eq!(restored, pg);
}

#[test]
fn reverse_complement_repeat_collapses_and_restores() {
    let dir = TempDir::new().unwrap();
    let unit = b"AACCGGTTACGT";
    let mut pg = Vec::new();
    pg.extend_from_slice(b"TTTT");
    pg.extend_from_slice(unit);
    pg.extend_from_slice(b"GGGG");
    pg.extend_from_slice(&reverse_complement(unit));
    pg.extend_from_slice(b"CCCC");
    let prefix = write_pg(&dir, "rcself", &pg);

    let matcher = PgMatcher::new(&prefix, 8).unwrap();
    matcher.mark_and_remove_exact_matches(&prefix, true, false).unwrap();

    let rewritten = read_element(&prefix, PSEUDOGENOME_FILE_SUFFIX);
    assert!(rewritten.contains(&MATCH_MARK));

    let restored = restore_matched_pg(&prefix, matcher.source_pg(), 8, true, false).unwrap();
    assert_eq!(restored, pg);
}

#[test]
fn cross_pg_reverse_complement_restores() {
    let dir = TempDir::new().unwrap();
    let src = b"AAAACCCGTTGCAATTTT".to_vec();
    // target carries the reverse complement of a 12-symbol source slice
    let slice = &src[3..15];
    let mut dest = Vec::new();
    dest.extend_from_slice(b"GGGG");
    dest.extend_from_slice(&reverse_complement(slice));
    dest.extend_from_slice(b"GGGG");
    let dest_prefix = write_pg(&dir, "rcdest", &dest);

    let matcher = PgMatcher::with_sequence("src", src.clone(), 10);
    matcher.mark_and_remove_exact_matches(&dest_prefix, true, false).unwrap();

    let rewritten = read_element(&dest_prefix, PSEUDOGENOME_FILE_SUFFIX);
    assert!(rewritten.contains(&MATCH_MARK));
    assert!(rewritten.len() < dest.len());

    let restored = restore_matched_pg(&dest_prefix, &src, 10, true, false).unwrap();
    assert_eq!(restored, dest);
}

#[test]
fn overlapping_matches_shrink_in_destination_order() {
    let dir = TempDir::new().unwrap();
    // two source repeats overlapping in the target by 4 symbols
    let a = b"ACGTACGTAC";
    let b = b"GTACCATGGA";
    let src = [&a[..], &b[..]].concat();
    let mut dest = Vec::new();
    dest.extend_from_slice(a);
    // the first 4 symbols of b equal the last 4 of a's occurrence
    dest.extend_from_slice(&b[4..]);
    let dest_prefix = write_pg(&dir, "overlap", &dest);

    let matcher = PgMatcher::with_sequence("src", src.clone(), 6);
    matcher.mark_and_remove_exact_matches(&dest_prefix, false, false).unwrap();

    let restored = restore_matched_pg(&dest_prefix, &src, 6, false, false).unwrap();
    assert_eq!(restored, dest);
}

#[test]
fn match_pg_in_pg_files_rewrites_both_prefixes() {
    let dir = TempDir::new().unwrap();
    let unit = b"ACGTTGCAACGTTGCA";
    let mut good = Vec::new();
    good.extend_from_slice(b"TTTT");
    good.extend_from_slice(unit);
    good.extend_from_slice(b"AAAA");
    good.extend_from_slice(unit);
    let mut bad = Vec::new();
    bad.extend_from_slice(b"GGGG");
    bad.extend_from_slice(unit);
    bad.extend_from_slice(b"GGGG");
    let good_prefix = write_pg(&dir, "good", &good);
    let bad_prefix = write_pg(&dir, "bad", &bad);

    match_pg_in_pg_files(&good_prefix, &bad_prefix, 10, false, false).unwrap();

    let good_rewritten = read_element(&good_prefix, PSEUDOGENOME_FILE_SUFFIX);
    let bad_rewritten = read_element(&bad_prefix, PSEUDOGENOME_FILE_SUFFIX);
    assert!(good_rewritten.contains(&MATCH_MARK));
    assert!(bad_rewritten.contains(&MATCH_MARK));

    let restored_good = restore_matched_pg(&good_prefix, &good, 10, false, false).unwrap();
    assert_eq!(restored_good, good);
    let restored_bad = restore_matched_pg(&bad_prefix, &good, 10, false, false).unwrap();
    assert_eq!(restored_bad, bad);
}
