//! Fixed-length reads containers and reads-division plumbing.
//!
//! The packed FASTQ container of the surrounding pipeline is an external
//! collaborator; the matcher only needs the [`ReadsSet`] view of it.
//! [`PlainReadsSet`] is the file-backed stand-in: one read per line,
//! constant length, concatenated into a single buffer.
//!
//! A *division* selects a subset of the reads source for matching (or its
//! complement); the indices of reads the matcher leaves unmatched are written
//! back as the next stage's division.

use std::fs;
use std::io::Write;
use std::path::Path;

use ahash::AHashSet;

use crate::error::PgError;

// ── ReadsSet view ────────────────────────────────────────────────────────────

/// Read-only view over a set of constant-length reads.
pub trait ReadsSet {
    fn reads_count(&self) -> u32;
    fn read_length(&self) -> u16;
    /// Bytes of the read at `idx`; exactly `read_length()` long.
    fn read(&self, idx: u32) -> &[u8];
}

/// Constant-length reads held as one concatenated buffer.
#[derive(Debug)]
pub struct PlainReadsSet {
    data: Vec<u8>,
    read_length: u16,
    reads_count: u32,
}

impl PlainReadsSet {
    /// Builds a set from in-memory reads, enforcing constant length.
    pub fn from_reads<'a, I>(reads: I) -> Result<Self, PgError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut data = Vec::new();
        let mut read_length: Option<usize> = None;
        let mut reads_count: u32 = 0;
        for read in reads {
            match read_length {
                None => read_length = Some(read.len()),
                Some(len) if len != read.len() => {
                    return Err(PgError::Config(format!(
                        "variable read length: {} after {}",
                        read.len(),
                        len
                    )))
                }
                Some(_) => {}
            }
            data.extend_from_slice(read);
            reads_count += 1;
        }
        let read_length = read_length.unwrap_or(0);
        if read_length > u16::MAX as usize {
            return Err(PgError::Config(format!("read length {read_length} too large")));
        }
        Ok(PlainReadsSet { data, read_length: read_length as u16, reads_count })
    }

    /// Loads a one-read-per-line file.  Blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self, PgError> {
        let raw = fs::read(path).map_err(|e| PgError::open(path.display().to_string(), e))?;
        Self::from_reads(lines_of(&raw))
    }

    /// Loads a paired source: reads from `path` and `pair_path` are
    /// interleaved, so mates sit at indices `2i` and `2i + 1`.
    pub fn load_paired(path: &Path, pair_path: &Path) -> Result<Self, PgError> {
        let raw_a = fs::read(path).map_err(|e| PgError::open(path.display().to_string(), e))?;
        let raw_b =
            fs::read(pair_path).map_err(|e| PgError::open(pair_path.display().to_string(), e))?;
        let a: Vec<&[u8]> = lines_of(&raw_a).collect();
        let b: Vec<&[u8]> = lines_of(&raw_b).collect();
        if a.len() != b.len() {
            return Err(PgError::Config(format!(
                "pair files hold {} and {} reads",
                a.len(),
                b.len()
            )));
        }
        Self::from_reads(a.iter().zip(b.iter()).flat_map(|(&x, &y)| [x, y]))
    }
}

impl ReadsSet for PlainReadsSet {
    fn reads_count(&self) -> u32 {
        self.reads_count
    }

    fn read_length(&self) -> u16 {
        self.read_length
    }

    fn read(&self, idx: u32) -> &[u8] {
        let len = self.read_length as usize;
        let start = idx as usize * len;
        &self.data[start..start + len]
    }
}

fn lines_of(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    raw.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
}

// ── Divisions ────────────────────────────────────────────────────────────────

/// Maps positions in a divided subset back to original read indices.
pub struct IndexesMapping {
    map: Vec<u32>,
}

impl IndexesMapping {
    /// Identity mapping for an undivided source.
    pub fn identity(count: u32) -> Self {
        IndexesMapping { map: (0..count).collect() }
    }

    /// Original index of the subset read at `idx`.
    #[inline]
    pub fn original(&self, idx: u32) -> u32 {
        self.map[idx as usize]
    }
}

/// Loads a division file: one read index per line.
pub fn load_division(path: &Path) -> Result<Vec<u32>, PgError> {
    let raw = fs::read(path).map_err(|e| PgError::open(path.display().to_string(), e))?;
    let mut indices = Vec::new();
    for line in lines_of(&raw) {
        let text = std::str::from_utf8(line)
            .map_err(|_| PgError::Config(format!("non-ASCII division entry in {}", path.display())))?;
        let idx: u32 = text.trim().parse().map_err(|_| {
            PgError::Config(format!("bad division entry {:?} in {}", text, path.display()))
        })?;
        indices.push(idx);
    }
    Ok(indices)
}

/// Writes a division file: one read index per line.
pub fn write_division(path: &Path, indices: &[u32]) -> Result<(), PgError> {
    let mut out = Vec::with_capacity(indices.len() * 8);
    for idx in indices {
        writeln!(out, "{idx}")?;
    }
    fs::write(path, out).map_err(|e| PgError::open(path.display().to_string(), e))
}

/// Restricts `set` to the division (or its complement), returning the subset
/// and the mapping from subset positions to original indices.
pub fn apply_division(
    set: &PlainReadsSet,
    division: &[u32],
    complement: bool,
) -> Result<(PlainReadsSet, IndexesMapping), PgError> {
    let listed: AHashSet<u32> = division.iter().copied().collect();
    let mut map = Vec::new();
    let mut kept: Vec<&[u8]> = Vec::new();
    for idx in 0..set.reads_count() {
        if listed.contains(&idx) != complement {
            map.push(idx);
            kept.push(set.read(idx));
        }
    }
    let subset = PlainReadsSet::from_reads(kept)?;
    Ok((subset, IndexesMapping { map }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(reads: &[&[u8]]) -> PlainReadsSet {
        PlainReadsSet::from_reads(reads.iter().copied()).unwrap()
    }

    #[test]
    fn constant_length_enforced() {
        let err = PlainReadsSet::from_reads([&b"ACGT"[..], b"ACG"]).unwrap_err();
        assert!(matches!(err, PgError::Config(_)));
    }

    #[test]
    fn indexing() {
        let set = set_of(&[b"ACGT", b"TTTT", b"GGCC"]);
        assert_eq!(set.reads_count(), 3);
        assert_eq!(set.read_length(), 4);
        assert_eq!(set.read(1), b"TTTT");
    }

    #[test]
    fn division_selects_listed() {
        let set = set_of(&[b"AAAA", b"CCCC", b"GGGG", b"TTTT"]);
        let (subset, mapping) = apply_division(&set, &[1, 3], false).unwrap();
        assert_eq!(subset.reads_count(), 2);
        assert_eq!(subset.read(0), b"CCCC");
        assert_eq!(mapping.original(0), 1);
        assert_eq!(mapping.original(1), 3);
    }

    #[test]
    fn division_complement_selects_rest() {
        let set = set_of(&[b"AAAA", b"CCCC", b"GGGG", b"TTTT"]);
        let (subset, mapping) = apply_division(&set, &[1, 3], true).unwrap();
        assert_eq!(subset.reads_count(), 2);
        assert_eq!(subset.read(1), b"GGGG");
        assert_eq!(mapping.original(0), 0);
        assert_eq!(mapping.original(1), 2);
    }
}
