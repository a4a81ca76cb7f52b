// Integration tests for the multi-stream output builder.
//
// Coverage:
//   - lockstep column lengths and the offsets-are-position-deltas property
//   - absolute-position and reverse-mismatch-offset representations
//   - plain-text numeric mode
//   - the temporary-file promote protocol and its failure atomicity
//   - pair-mapping columns
//   - buffered build-to-files and the compressed build round trip

use std::fs;
use std::path::Path;

use pgmatch::compress::{read_compressed, read_mismatch_offsets_stratified, CoderLevel};
use pgmatch::error::PgError;
use pgmatch::pg::output_builder::{Column, SeparatedPgOutputBuilder, WriteOptions};
use pgmatch::pg::persistence::TEMPORARY_FILE_SUFFIX;
use pgmatch::pg::properties::PgProperties;
use pgmatch::pg::reads_list::ReadsListEntry;
use pgmatch::util::read_uint_byte_frugal;
use tempfile::TempDir;

fn entry(pos: u64, idx: u32, rev: bool, mismatches: &[(u16, u8)]) -> ReadsListEntry {
    let mut e = ReadsListEntry::new(pos, idx, rev);
    for &(off, base) in mismatches {
        e.add_mismatch(off, base);
    }
    e
}

fn props(reads: u64) -> PgProperties {
    PgProperties { reads_count: reads, pg_length: 64, read_length: 10, constant_read_length: true }
}

fn sample_entries() -> Vec<ReadsListEntry> {
    vec![
        entry(5, 2, false, &[]),
        entry(9, 0, true, &[(2, b'C'), (5, b'G')]),
        entry(20, 1, false, &[(7, b'T')]),
    ]
}

fn filled_buffered(opts: WriteOptions) -> SeparatedPgOutputBuilder {
    let mut builder = SeparatedPgOutputBuilder::buffered(opts, 10);
    builder.write_pseudo_genome(b"ACGT").unwrap();
    builder.set_properties(props(3));
    for e in sample_entries() {
        builder.write_read_entry(&e).unwrap();
    }
    builder
}

#[test]
fn columns_stay_in_lockstep() {
    let builder = filled_buffered(WriteOptions::default());
    assert_eq!(builder.reads_counter(), 3);
    assert_eq!(builder.column_bytes(Column::Idx).unwrap().len(), 3 * 4);
    assert_eq!(builder.column_bytes(Column::RevComp).unwrap(), [0, 1, 0]);
    assert_eq!(builder.column_bytes(Column::MisCnt).unwrap(), [0, 2, 1]);
    assert_eq!(builder.column_bytes(Column::MisSym).unwrap(), b"CGT");
    assert_eq!(builder.column_bytes(Column::MisPos).unwrap(), [2, 5, 7]);
}

#[test]
fn offset_prefix_sums_recover_positions() {
    let builder = filled_buffered(WriteOptions::default());
    let mut src = builder.column_bytes(Column::Pos).unwrap();
    let mut pos = 0u64;
    let mut recovered = Vec::new();
    for _ in 0..3 {
        pos += read_uint_byte_frugal(&mut src, false).unwrap();
        recovered.push(pos);
    }
    assert_eq!(recovered, [5, 9, 20]);
}

#[test]
fn absolute_positions_column() {
    let opts = WriteOptions { absolute_positions: true, ..WriteOptions::default() };
    let builder = filled_buffered(opts);
    let bytes = builder.column_bytes(Column::Pos).unwrap();
    let positions: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(positions, [5, 9, 20]);
}

#[test]
fn reverse_mismatch_offsets_are_tail_first() {
    let opts = WriteOptions { rev_offset_mismatches: true, ..WriteOptions::default() };
    let builder = filled_buffered(opts);
    // matching length 10: offsets 2 and 5 become 9-5=4 first, then 9-2=7
    assert_eq!(builder.column_bytes(Column::MisPos).unwrap(), [4, 7, 2]);
    // symbols follow the same tail-first order
    assert_eq!(builder.column_bytes(Column::MisSym).unwrap(), b"GCT");
}

#[test]
fn plain_text_mode_writes_ascii() {
    let opts = WriteOptions { plain_text: true, ..WriteOptions::default() };
    let builder = filled_buffered(opts);
    assert_eq!(builder.column_bytes(Column::Pos).unwrap(), b"5 4 11 ");
    assert_eq!(builder.column_bytes(Column::Idx).unwrap(), b"2 0 1 ");
    assert_eq!(builder.column_bytes(Column::MisCnt).unwrap(), b"0 2 1 ");
}

#[test]
fn out_of_order_entries_rejected() {
    let mut builder = SeparatedPgOutputBuilder::buffered(WriteOptions::default(), 10);
    builder.write_read_entry(&entry(9, 0, false, &[])).unwrap();
    let err = builder.write_read_entry(&entry(5, 1, false, &[])).unwrap_err();
    assert!(matches!(err, PgError::Inconsistent(_)));
}

#[test]
fn pair_columns_record_back_links() {
    let opts = WriteOptions { pair_streams: true, ..WriteOptions::default() };
    let mut builder = SeparatedPgOutputBuilder::buffered(opts, 10);
    builder.write_pair_entry(0, 2, true).unwrap();
    builder.write_pair_entry(1, 5, false).unwrap();
    assert_eq!(builder.column_bytes(Column::PairIdx).unwrap().len(), 8);
    assert_eq!(builder.column_bytes(Column::PairOff).unwrap(), [2, 5]);
    assert_eq!(builder.column_bytes(Column::PairSf).unwrap(), [1, 0]);
}

#[test]
fn pair_columns_disabled_by_default() {
    let mut builder = SeparatedPgOutputBuilder::buffered(WriteOptions::default(), 10);
    let err = builder.write_pair_entry(0, 1, true).unwrap_err();
    assert!(matches!(err, PgError::Inconsistent(_)));
}

// ── File mode ────────────────────────────────────────────────────────────────

#[test]
fn on_the_fly_build_promotes_temporaries() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("out").to_string_lossy().into_owned();
    let opts = WriteOptions::default();

    let mut builder = SeparatedPgOutputBuilder::on_the_fly(&prefix, opts.clone(), 10).unwrap();
    builder.write_pseudo_genome(b"ACGTACGT").unwrap();
    builder.set_properties(props(3));
    for e in sample_entries() {
        builder.write_read_entry(&e).unwrap();
    }

    let final_pg = format!("{prefix}.pg");
    let temp_pg = format!("{final_pg}{TEMPORARY_FILE_SUFFIX}");
    assert!(Path::new(&temp_pg).exists());
    assert!(!Path::new(&final_pg).exists());

    builder.build().unwrap();
    assert!(Path::new(&final_pg).exists());
    assert!(!Path::new(&temp_pg).exists());
    assert_eq!(fs::read(&final_pg).unwrap(), b"ACGTACGT");

    for suffix in ["_prop.pg", "_rl_off.pg", "_rl_idx.pg", "_rl_rc.pg", "_rl_mis_cnt.pg"] {
        assert!(Path::new(&format!("{prefix}{suffix}")).exists(), "missing {suffix}");
    }
}

#[test]
fn reads_count_mismatch_aborts_before_promoting() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("out").to_string_lossy().into_owned();

    let mut builder =
        SeparatedPgOutputBuilder::on_the_fly(&prefix, WriteOptions::default(), 10).unwrap();
    builder.write_pseudo_genome(b"ACGT").unwrap();
    builder.set_properties(props(7)); // wrong on purpose
    builder.write_read_entry(&entry(5, 0, false, &[])).unwrap();

    let err = builder.build().unwrap_err();
    assert!(matches!(err, PgError::Inconsistent(_)));
    assert!(!Path::new(&format!("{prefix}.pg")).exists());
}

#[test]
fn buffered_build_to_writes_the_same_bytes() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("dump").to_string_lossy().into_owned();

    let builder = filled_buffered(WriteOptions::default());
    let idx_snapshot = builder.column_bytes(Column::Idx).unwrap().to_vec();
    let pos_snapshot = builder.column_bytes(Column::Pos).unwrap().to_vec();
    let mut builder = builder;
    builder.build_to(&prefix).unwrap();

    assert_eq!(fs::read(format!("{prefix}_rl_idx.pg")).unwrap(), idx_snapshot);
    assert_eq!(fs::read(format!("{prefix}_rl_off.pg")).unwrap(), pos_snapshot);
    assert_eq!(fs::read(format!("{prefix}.pg")).unwrap(), b"ACGT");
    assert!(!Path::new(&format!("{prefix}.pg{TEMPORARY_FILE_SUFFIX}")).exists());
}

// ── Compressed build ─────────────────────────────────────────────────────────

#[test]
fn compressed_build_round_trips_every_column() {
    let builder = filled_buffered(WriteOptions::default());
    let snapshots: Vec<(Column, Option<Vec<u8>>)> = Column::ALL
        .iter()
        .map(|&c| (c, builder.column_bytes(c).map(|b| b.to_vec())))
        .collect();

    let mut builder = builder;
    let mut out = Vec::new();
    builder.compressed_build(&mut out, CoderLevel::Normal).unwrap();

    let mut src = out.as_slice();
    let mut mis_counts: Vec<u8> = Vec::new();
    for (column, snapshot) in snapshots {
        let mut presence = [0u8; 1];
        std::io::Read::read_exact(&mut src, &mut presence).unwrap();
        match snapshot {
            None => assert_eq!(presence[0], 0, "{column:?} should be absent"),
            Some(expected) => {
                assert_eq!(presence[0], 1, "{column:?} should be present");
                let expected = if column == Column::Props {
                    // the properties column is sealed during the build
                    let mut buf = Vec::new();
                    props(3).write(&mut buf, false).unwrap();
                    buf
                } else {
                    expected
                };
                let decoded = if column == Column::MisPos {
                    read_mismatch_offsets_stratified(&mut src, &mis_counts, 1).unwrap()
                } else {
                    read_compressed(&mut src).unwrap()
                };
                assert_eq!(decoded, expected, "column {column:?}");
                if column == Column::MisCnt {
                    mis_counts = decoded;
                }
            }
        }
    }
    assert!(src.is_empty(), "trailing bytes after the last column");
}
