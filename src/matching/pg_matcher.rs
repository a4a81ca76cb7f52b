//! Long-substring matching between pseudogenomes and the copy-directive
//! rewrite of the target.
//!
//! Seeds come from the hash matcher with a window of `min_match_length`
//! registered at every source position; each verified seed is extended
//! greedily in both directions, and per-diagonal coverage tracking drops
//! seeds already inside an emitted extension so only the longest match of a
//! run survives.
//!
//! The rewrite pass walks the target in destination order: literal runs are
//! copied through, each match becomes the sentinel byte plus one entry in
//! the mapping-offsets and mapping-lengths side streams, and overlaps
//! between consecutive matches shrink the later one (dropping it when it
//! falls below the minimum length).

use ahash::AHashMap;

use crate::displaylevel;
use crate::error::PgError;
use crate::matching::hash_matcher::ConstLenHashMatcher;
use crate::pg::persistence::{
    accept_temporary, element_dest, element_src, load_pseudo_genome,
    PSEUDOGENOME_FILE_SUFFIX, PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX,
    PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX,
};
use crate::seq::{self, MATCH_MARK};
use crate::util::{read_uint_byte_frugal, read_value, write_uint_byte_frugal, write_value};

use std::io::{Read, Write};

/// One extended exact match between a source and a target pseudogenome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    pub pos_src: u64,
    pub pos_dest: u64,
    pub length: u64,
}

impl TextMatch {
    #[inline]
    pub fn end_src(&self) -> u64 {
        self.pos_src + self.length
    }

    #[inline]
    pub fn end_dest(&self) -> u64 {
        self.pos_dest + self.length
    }
}

/// Default minimum match length worth a copy directive.
pub const DEFAULT_MIN_MATCH_LENGTH: usize = 50;

// ── Matcher ──────────────────────────────────────────────────────────────────

/// Finds substrings of the source pseudogenome inside targets and rewrites
/// targets into literal runs plus copy-from-source directives.
pub struct PgMatcher {
    src_prefix: String,
    src_pg: Vec<u8>,
    min_match_length: usize,
    matcher: ConstLenHashMatcher,
}

impl PgMatcher {
    /// Loads the source pseudogenome under `src_prefix` and indexes every
    /// window of `min_match_length` bytes.
    pub fn new(src_prefix: &str, min_match_length: usize) -> Result<Self, PgError> {
        let src_pg = load_pseudo_genome(src_prefix)?;
        Ok(Self::with_sequence(src_prefix, src_pg, min_match_length))
    }

    /// Same, for an already-loaded source sequence.
    pub fn with_sequence(src_prefix: &str, src_pg: Vec<u8>, min_match_length: usize) -> Self {
        displaylevel!(2, "source pseudogenome length: {}", src_pg.len());
        let mut matcher = ConstLenHashMatcher::new(min_match_length);
        matcher.add_text_patterns(&src_pg);
        PgMatcher { src_prefix: src_prefix.to_owned(), src_pg, min_match_length, matcher }
    }

    pub fn source_pg(&self) -> &[u8] {
        &self.src_pg
    }

    /// Seeds, verifies, extends, and de-duplicates matches of the source
    /// inside `dest`.  `dest_is_src` suppresses the trivial self-diagonal.
    pub fn match_texts(&self, dest: &[u8], dest_is_src: bool) -> Vec<TextMatch> {
        let w = self.min_match_length;
        let mut covered_by_diagonal: AHashMap<i64, u64> = AHashMap::new();
        let mut matches = Vec::new();

        for hit in self.matcher.iterate_over(dest) {
            let src_pos = hit.pattern_id as usize;
            let dest_pos = hit.text_pos as usize;
            if dest_is_src && src_pos == dest_pos {
                continue;
            }
            let diagonal = dest_pos as i64 - src_pos as i64;
            if let Some(&end) = covered_by_diagonal.get(&diagonal) {
                if (dest_pos as u64) < end {
                    continue;
                }
            }
            if self.src_pg[src_pos..src_pos + w] != dest[dest_pos..dest_pos + w] {
                continue;
            }

            let mut back = 0usize;
            while back < src_pos.min(dest_pos)
                && self.src_pg[src_pos - back - 1] == dest[dest_pos - back - 1]
            {
                back += 1;
            }
            let mut forward = 0usize;
            while src_pos + w + forward < self.src_pg.len()
                && dest_pos + w + forward < dest.len()
                && self.src_pg[src_pos + w + forward] == dest[dest_pos + w + forward]
            {
                forward += 1;
            }

            let found = TextMatch {
                pos_src: (src_pos - back) as u64,
                pos_dest: (dest_pos - back) as u64,
                length: (w + back + forward) as u64,
            };
            covered_by_diagonal.insert(diagonal, found.end_dest());
            matches.push(found);
        }
        displaylevel!(3, "{} extended matches of length >= {w}", matches.len());
        matches
    }

    /// Matches `dest_prefix` against the source and rewrites its
    /// pseudogenome file into literals plus copy directives, emitting the
    /// mapping side streams.  All writes go through temporaries promoted at
    /// the end.
    pub fn mark_and_remove_exact_matches(
        &self,
        dest_prefix: &str,
        rev_compl: bool,
        plain_text: bool,
    ) -> Result<(), PgError> {
        let dest_is_src = dest_prefix == self.src_prefix;
        let mut dest_pg = if dest_is_src {
            self.src_pg.clone()
        } else {
            load_pseudo_genome(dest_prefix)?
        };
        displaylevel!(2, "target pseudogenome length: {}", dest_pg.len());

        if rev_compl {
            seq::reverse_complement_in_place(&mut dest_pg);
        }
        let mut matches = self.match_texts(&dest_pg, dest_is_src && !rev_compl);
        if rev_compl {
            let len = dest_pg.len() as u64;
            for m in &mut matches {
                m.pos_dest = len - (m.pos_dest + m.length);
            }
            seq::reverse_complement_in_place(&mut dest_pg);
        }
        if dest_is_src {
            resolve_same_text_collisions(&mut matches, rev_compl);
        }
        self.rewrite_target(dest_prefix, &dest_pg, matches, rev_compl, plain_text)
    }

    fn rewrite_target(
        &self,
        dest_prefix: &str,
        dest_pg: &[u8],
        mut matches: Vec<TextMatch>,
        rev_compl: bool,
        plain_text: bool,
    ) -> Result<(), PgError> {
        matches.sort_unstable_by_key(|m| (m.pos_dest, m.pos_src, m.length));

        let mut pg_dest = element_dest(dest_prefix, PSEUDOGENOME_FILE_SUFFIX, true)?;
        let mut map_off_dest =
            element_dest(dest_prefix, PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX, true)?;
        let mut map_len_dest =
            element_dest(dest_prefix, PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX, true)?;

        let min_len = self.min_match_length as u64;
        let src_is_std = self.src_pg.len() <= u32::MAX as usize;
        let mut pos: u64 = 0;
        let mut total_overlap: u64 = 0;
        let mut total_matched: u64 = 0;

        for mut m in matches {
            if m.pos_dest < pos {
                let overflow = pos - m.pos_dest;
                if overflow > m.length {
                    total_overlap += m.length;
                    continue;
                }
                total_overlap += overflow;
                m.length -= overflow;
                m.pos_dest += overflow;
                if !rev_compl {
                    m.pos_src += overflow;
                }
            }
            if m.length < min_len {
                total_overlap += m.length;
                continue;
            }
            total_matched += m.length;
            pg_dest.write_all(&dest_pg[pos as usize..m.pos_dest as usize])?;
            pg_dest.write_all(&[MATCH_MARK])?;
            if src_is_std {
                write_value::<u32, _>(&mut map_off_dest, m.pos_src as u32, plain_text)?;
            } else {
                write_value::<u64, _>(&mut map_off_dest, m.pos_src, plain_text)?;
            }
            write_uint_byte_frugal(&mut map_len_dest, m.length - min_len, plain_text)?;
            pos = m.end_dest();
        }
        pg_dest.write_all(&dest_pg[pos as usize..])?;

        pg_dest.flush()?;
        map_off_dest.flush()?;
        map_len_dest.flush()?;
        drop(pg_dest);
        drop(map_off_dest);
        drop(map_len_dest);
        accept_temporary(dest_prefix, PSEUDOGENOME_FILE_SUFFIX)?;
        accept_temporary(dest_prefix, PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX)?;
        accept_temporary(dest_prefix, PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX)?;

        displaylevel!(
            2,
            "final size of Pg: {} (removed: {} = {:.1}%; {} chars in overlapped dest symbols)",
            dest_pg.len() as u64 - total_matched,
            total_matched,
            (total_matched * 100) as f64 / dest_pg.len().max(1) as f64,
            total_overlap
        );
        Ok(())
    }
}

/// Normalizes same-text matches so the source interval precedes the
/// destination, trimming the front of reverse-complement matches whose
/// intervals still overlap.
fn resolve_same_text_collisions(matches: &mut [TextMatch], rev_compl: bool) {
    for m in matches {
        if m.pos_src > m.pos_dest {
            std::mem::swap(&mut m.pos_src, &mut m.pos_dest);
        }
        if rev_compl && m.end_src() > m.pos_dest {
            let margin = (m.end_src() - m.pos_dest + 1) / 2;
            m.length -= margin;
            m.pos_dest += margin;
        }
    }
}

/// Matches both prefixes against the first one's sequence: the good
/// pseudogenome collapses onto itself, then the bad one is expressed in
/// terms of it.
pub fn match_pg_in_pg_files(
    good_pg_prefix: &str,
    bad_pg_prefix: &str,
    min_match_length: usize,
    rev_compl: bool,
    plain_text: bool,
) -> Result<(), PgError> {
    let matcher = PgMatcher::new(good_pg_prefix, min_match_length)?;
    matcher.mark_and_remove_exact_matches(good_pg_prefix, rev_compl, plain_text)?;
    matcher.mark_and_remove_exact_matches(bad_pg_prefix, rev_compl, plain_text)?;
    Ok(())
}

/// Expands a rewritten target back to its original bytes: literal runs are
/// copied through, every sentinel consumes one entry from each mapping
/// stream and splices the referenced source slice (reverse-complemented
/// when the matching ran against the reverse strand).
pub fn restore_matched_pg(
    dest_prefix: &str,
    src_pg: &[u8],
    min_match_length: usize,
    rev_compl: bool,
    plain_text: bool,
) -> Result<Vec<u8>, PgError> {
    let mut rewritten = Vec::new();
    element_src(dest_prefix, PSEUDOGENOME_FILE_SUFFIX)?.read_to_end(&mut rewritten)?;
    let mut map_off_src = element_src(dest_prefix, PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX)?;
    let mut map_len_src = element_src(dest_prefix, PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX)?;

    let src_is_std = src_pg.len() <= u32::MAX as usize;
    let mut out = Vec::with_capacity(rewritten.len());
    for &b in &rewritten {
        if b != MATCH_MARK {
            out.push(b);
            continue;
        }
        let pos_src: u64 = if src_is_std {
            read_value::<u32, _>(&mut map_off_src, plain_text)? as u64
        } else {
            read_value::<u64, _>(&mut map_off_src, plain_text)?
        };
        let length = read_uint_byte_frugal(&mut map_len_src, plain_text)? + min_match_length as u64;
        let slice = &src_pg[pos_src as usize..(pos_src + length) as usize];
        if rev_compl {
            out.extend(seq::reverse_complement(slice));
        } else {
            out.extend_from_slice(slice);
        }
    }
    Ok(out)
}
