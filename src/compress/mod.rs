//! Compressed-stream staging for the separated output columns.
//!
//! Each column travels as one framed block: uncompressed length (u64),
//! payload length (u64), a one-byte codec tag, then the payload.  An empty
//! column is just the zero length.  The LZMA-family tags are reserved for
//! the external entropy back-ends; the built-in store back-end (tag 0) keeps
//! the framing, the driver and the tests fully exercisable without them.
//!
//! The mismatch-offsets column gets special treatment: entries are
//! stratified by their read's mismatch count into up to
//! [`MISMATCHES_COUNT_DESTS_LIMIT`] buckets, each bucket forming an `m`-wide
//! matrix that can be transposed to column-major order before compression so
//! per-position regularities line up.  The bucket framing records everything
//! needed to reassemble the exact original column bytes.

use std::io::{Read, Write};

use crate::error::PgError;
use crate::util::{read_value, write_value};

// ── Codec tags, levels, element periods ──────────────────────────────────────

/// Built-in pass-through back-end.
pub const STORE_CODER: u8 = 0;
/// Reserved for the external LZMA back-end.
pub const LZMA_CODER: u8 = 1;
/// Reserved for the external LZMA2 back-end.
pub const LZMA2_CODER: u8 = 2;
/// Reserved for the external PPMd7 back-end.
pub const PPMD7_CODER: u8 = 3;

/// Element width hints handed to the back-end (`coder_param`).
pub const DATA_PERIOD_CODE_8: i32 = 0;
pub const DATA_PERIOD_CODE_16: i32 = 1;
pub const DATA_PERIOD_CODE_32: i32 = 2;
pub const DATA_PERIOD_CODE_64: i32 = 3;
pub const DATA_PERIOD_CODE_128: i32 = 4;

/// Effort level forwarded to the back-end; also selects the stratified
/// bucket budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderLevel {
    Fast,
    Normal,
    Max,
}

/// Upper bound on mismatch-count strata.
pub const MISMATCHES_COUNT_DESTS_LIMIT: usize = 12;

/// Bucket budget at a given level: one raw bucket at fast, the full stratum
/// family otherwise.
pub fn mismatch_bucket_limit(level: CoderLevel) -> usize {
    match level {
        CoderLevel::Fast => 1,
        CoderLevel::Normal | CoderLevel::Max => MISMATCHES_COUNT_DESTS_LIMIT,
    }
}

/// Per-column codec choice.
#[derive(Debug, Clone, Copy)]
pub struct CoderSpec {
    pub coder_type: u8,
    pub level: CoderLevel,
    pub param: i32,
}

impl CoderSpec {
    pub fn store(level: CoderLevel) -> Self {
        CoderSpec { coder_type: STORE_CODER, level, param: -1 }
    }
}

// ── Back-end interface ───────────────────────────────────────────────────────

/// A generic entropy back-end the driver stages columns through.
pub trait EntropyCoder {
    fn compress(&self, src: &[u8], level: CoderLevel, param: i32) -> Result<Vec<u8>, PgError>;
    fn decompress(&self, src: &[u8], dest_len: usize) -> Result<Vec<u8>, PgError>;
}

/// Pass-through back-end.
pub struct StoreCoder;

impl EntropyCoder for StoreCoder {
    fn compress(&self, src: &[u8], _level: CoderLevel, _param: i32) -> Result<Vec<u8>, PgError> {
        Ok(src.to_vec())
    }

    fn decompress(&self, src: &[u8], dest_len: usize) -> Result<Vec<u8>, PgError> {
        if src.len() != dest_len {
            return Err(PgError::Inconsistent(format!(
                "stored payload is {} bytes, expected {dest_len}",
                src.len()
            )));
        }
        Ok(src.to_vec())
    }
}

/// Resolves a codec tag to its back-end.
pub fn coder_for(coder_type: u8) -> Result<&'static dyn EntropyCoder, PgError> {
    match coder_type {
        STORE_CODER => Ok(&StoreCoder),
        LZMA_CODER | LZMA2_CODER | PPMD7_CODER => {
            Err(PgError::Unimplemented("LZMA-family entropy back-end"))
        }
        other => Err(PgError::Inconsistent(format!("unknown codec tag {other}"))),
    }
}

// ── Framed blocks ────────────────────────────────────────────────────────────

/// Compresses `src` into one framed block on `dest`.
pub fn write_compressed<W: Write + ?Sized>(
    dest: &mut W,
    src: &[u8],
    spec: CoderSpec,
) -> Result<(), PgError> {
    write_value::<u64, _>(dest, src.len() as u64, false)?;
    if src.is_empty() {
        return Ok(());
    }
    let payload = coder_for(spec.coder_type)?.compress(src, spec.level, spec.param)?;
    write_value::<u64, _>(dest, payload.len() as u64, false)?;
    write_value::<u8, _>(dest, spec.coder_type, false)?;
    dest.write_all(&payload)?;
    Ok(())
}

/// Reads back one framed block, validating the decompressed length.
pub fn read_compressed<R: Read + ?Sized>(src: &mut R) -> Result<Vec<u8>, PgError> {
    let dest_len: u64 = read_value(src, false)?;
    if dest_len == 0 {
        return Ok(Vec::new());
    }
    let src_len: u64 = read_value(src, false)?;
    let coder_type: u8 = read_value(src, false)?;
    let mut payload = vec![0u8; src_len as usize];
    src.read_exact(&mut payload)?;
    let out = coder_for(coder_type)?.decompress(&payload, dest_len as usize)?;
    if out.len() as u64 != dest_len {
        return Err(PgError::Inconsistent(format!(
            "decompressed {} bytes, header promised {dest_len}",
            out.len()
        )));
    }
    Ok(out)
}

// ── Stratified mismatch-offset staging ───────────────────────────────────────

/// Row-major → column-major flip of a `rows × elems` matrix of
/// `elem_width`-byte cells.
fn transpose(src: &[u8], rows: usize, elems: usize, elem_width: usize) -> Vec<u8> {
    let mut out = vec![0u8; src.len()];
    for r in 0..rows {
        for e in 0..elems {
            let from = (r * elems + e) * elem_width;
            let to = (e * rows + r) * elem_width;
            out[to..to + elem_width].copy_from_slice(&src[from..from + elem_width]);
        }
    }
    out
}

/// Splits the column into per-stratum buckets: exact buckets for counts
/// `1..limit` and one overflow bucket for everything at or above `limit`
/// (everything at all when `limit == 1`).
fn stratify(
    data: &[u8],
    counts: &[u8],
    elem_width: usize,
    limit: usize,
) -> Result<Vec<Vec<u8>>, PgError> {
    let mut buckets: Vec<Vec<u8>> = vec![Vec::new(); limit];
    let mut cursor = 0usize;
    for &cnt in counts {
        let m = cnt as usize;
        let row = m * elem_width;
        if cursor + row > data.len() {
            return Err(PgError::Inconsistent(
                "mismatch-offsets column shorter than its counts".into(),
            ));
        }
        if m > 0 {
            let bucket = if m < limit { m - 1 } else { limit - 1 };
            buckets[bucket].extend_from_slice(&data[cursor..cursor + row]);
        }
        cursor += row;
    }
    if cursor != data.len() {
        return Err(PgError::Inconsistent(
            "mismatch-offsets column longer than its counts".into(),
        ));
    }
    Ok(buckets)
}

/// Writes the mismatch-offsets column stratified by mismatch count.
///
/// Framing: transpose flag (u8), bucket limit (u8), then `limit` framed
/// blocks — exact strata for counts `1..limit`, the overflow stratum last.
/// Only the exact strata are transposed.
pub fn write_mismatch_offsets_stratified<W: Write + ?Sized>(
    dest: &mut W,
    data: &[u8],
    counts: &[u8],
    elem_width: usize,
    spec: CoderSpec,
) -> Result<(), PgError> {
    let limit = mismatch_bucket_limit(spec.level);
    let transposed = spec.level != CoderLevel::Fast;
    let buckets = stratify(data, counts, elem_width, limit)?;

    write_value::<u8, _>(dest, transposed as u8, false)?;
    write_value::<u8, _>(dest, limit as u8, false)?;
    for (i, bucket) in buckets.iter().enumerate() {
        let m = i + 1;
        let is_overflow = m == limit && limit > 1 || limit == 1;
        if transposed && !is_overflow && !bucket.is_empty() {
            let rows = bucket.len() / (m * elem_width);
            write_compressed(dest, &transpose(bucket, rows, m, elem_width), spec)?;
        } else {
            write_compressed(dest, bucket, spec)?;
        }
    }
    Ok(())
}

/// Reads a stratified mismatch-offsets column back into its original
/// entry-order byte layout, guided by the mismatch-count column.
pub fn read_mismatch_offsets_stratified<R: Read + ?Sized>(
    src: &mut R,
    counts: &[u8],
    elem_width: usize,
) -> Result<Vec<u8>, PgError> {
    let transposed: u8 = read_value(src, false)?;
    let limit: u8 = read_value(src, false)?;
    let limit = limit as usize;
    if limit == 0 {
        return Err(PgError::Inconsistent("zero stratified bucket limit".into()));
    }

    let mut buckets: Vec<Vec<u8>> = Vec::with_capacity(limit);
    for i in 0..limit {
        let m = i + 1;
        let is_overflow = m == limit && limit > 1 || limit == 1;
        let mut bucket = read_compressed(src)?;
        if transposed != 0 && !is_overflow && !bucket.is_empty() {
            if bucket.len() % (m * elem_width) != 0 {
                return Err(PgError::Inconsistent(format!(
                    "stratum {m} holds {} bytes, not a multiple of its row size",
                    bucket.len()
                )));
            }
            let rows = bucket.len() / (m * elem_width);
            // column-major back to row-major
            bucket = transpose(&bucket, m, rows, elem_width);
        }
        buckets.push(bucket);
    }

    let mut cursors = vec![0usize; limit];
    let mut out = Vec::new();
    for &cnt in counts {
        let m = cnt as usize;
        if m == 0 {
            continue;
        }
        let bucket = if m < limit { m - 1 } else { limit - 1 };
        let row = m * elem_width;
        let cur = cursors[bucket];
        let data = &buckets[bucket];
        if cur + row > data.len() {
            return Err(PgError::Inconsistent(format!(
                "stratum {} exhausted while rebuilding the offsets column",
                bucket + 1
            )));
        }
        out.extend_from_slice(&data[cur..cur + row]);
        cursors[bucket] = cur + row;
    }
    for (i, (&cur, bucket)) in cursors.iter().zip(&buckets).enumerate() {
        if cur != bucket.len() {
            return Err(PgError::Inconsistent(format!(
                "stratum {} holds {} unclaimed bytes",
                i + 1,
                bucket.len() - cur
            )));
        }
    }
    Ok(out)
}
