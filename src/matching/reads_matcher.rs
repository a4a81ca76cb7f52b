//! Matching of fixed-length reads against a pseudogenome.
//!
//! A [`ReadsMatcher`] owns the per-read best-match state and drives one
//! strategy object over the forward pseudogenome view (and its reverse
//! complement when enabled):
//!
//! - **exact** — one pattern per read, byte-equality verification, first
//!   match wins;
//! - **approximate** — q-gram partition seeding: the matching prefix is cut
//!   into `k + 1` equal blocks registered as separate seeds, so any
//!   alignment with at most `k` mismatches keeps at least one block intact;
//!   candidates are verified by early-exit mismatch counting and a strictly
//!   smaller count replaces the recorded match.
//!
//! The strategy surface is three hooks — pattern registration, hit
//! decoding/verification, and best-state folding — so both modes share one
//! scan loop and one state table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use smallvec::SmallVec;

use crate::displaylevel;
use crate::error::PgError;
use crate::matching::hash_matcher::{
    ConstLenHashMatcher, HashMatch, HashMatchIter, InterleavedHashMatcher,
};
use crate::pg::output_builder::{SeparatedPgOutputBuilder, WriteOptions};
use crate::pg::persistence::load_pseudo_genome;
use crate::pg::properties::PgProperties;
use crate::pg::reads_list::ReadsListEntry;
use crate::reads::{write_division, IndexesMapping, ReadsSet};
use crate::seq;

/// Per-read position sentinel: the read has not been matched.
pub const NOT_MATCHED_POSITION: u32 = u32::MAX;

/// Legacy text-dump suffixes.
pub const OFFSETS_DUMP_SUFFIX: &str = "_matched_offsets.txt";
pub const MISSED_READS_DUMP_SUFFIX: &str = "_missed.txt";
pub const SUFFIXES_DUMP_SUFFIX: &str = "_matched_suffixes.txt";

// ── Configuration ────────────────────────────────────────────────────────────

/// Matching configuration threaded through the matcher constructor.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Also scan the reverse complement of the pseudogenome.
    pub rev_compl_pg: bool,
    /// Match only this prefix of each read; `None` matches the whole read.
    pub match_prefix_length: Option<u16>,
    /// Mismatch count the seeding is dimensioned for.
    pub target_mismatches: u8,
    /// Mismatch budget a verified match may not exceed.
    pub max_mismatches: u8,
    /// Matches at or below this count stop further attempts for the read.
    pub min_mismatches: u8,
    /// Group each read's seed blocks in the fingerprint table.
    pub interleaved_seeds: bool,
}

impl MatchConfig {
    /// Exact matching over whole reads, forward strand only.
    pub fn exact() -> Self {
        MatchConfig {
            rev_compl_pg: false,
            match_prefix_length: None,
            target_mismatches: 0,
            max_mismatches: 0,
            min_mismatches: 0,
            interleaved_seeds: false,
        }
    }

    fn validate(&self) -> Result<(), PgError> {
        if self.min_mismatches > self.max_mismatches {
            return Err(PgError::Config(format!(
                "min mismatches ({}) higher than max mismatches ({})",
                self.min_mismatches, self.max_mismatches
            )));
        }
        if self.target_mismatches > self.max_mismatches {
            return Err(PgError::Config(format!(
                "target mismatches ({}) higher than max mismatches ({})",
                self.target_mismatches, self.max_mismatches
            )));
        }
        if self.match_prefix_length == Some(0) {
            return Err(PgError::Config("zero match prefix length".into()));
        }
        Ok(())
    }

    /// Number of seed blocks the approximate mode registers per read.  One
    /// block per allowed mismatch plus one, so any alignment within the
    /// budget keeps at least one block intact.
    fn seed_parts(&self) -> u32 {
        self.max_mismatches as u32 + 1
    }
}

/// Matching counters reported after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub matched_reads_count: u64,
    pub multi_match_count: u64,
    pub false_match_count: u64,
}

// ── Per-read state ───────────────────────────────────────────────────────────

struct MatchState {
    match_pos: Vec<u32>,
    match_rc: Vec<bool>,
    mismatches: Vec<u8>,
    stats: MatchStats,
}

impl MatchState {
    fn new(reads_count: u32) -> Self {
        let n = reads_count as usize;
        MatchState {
            match_pos: vec![NOT_MATCHED_POSITION; n],
            match_rc: vec![false; n],
            mismatches: vec![u8::MAX; n],
            stats: MatchStats::default(),
        }
    }
}

/// Counts differing bytes, giving up once the count would exceed `limit`.
/// Returns `u8::MAX` on give-up, the exact count (`<= limit`) otherwise.
pub fn count_mismatches(pattern: &[u8], text: &[u8], limit: u8) -> u8 {
    let mut res = 0u8;
    for (&p, &t) in pattern.iter().zip(text) {
        if p != t {
            if res >= limit {
                return u8::MAX;
            }
            res += 1;
        }
    }
    res
}

/// Forward-strand position of a window found at `align_pos` on the scanned
/// view; reverse-view positions flip back through the text length.
#[inline]
fn effective_position(text_len: u64, align_pos: u64, matching_length: u16, rev_comp: bool) -> u64 {
    if rev_comp {
        text_len - (align_pos + matching_length as u64)
    } else {
        align_pos
    }
}

// ── Strategy objects ─────────────────────────────────────────────────────────

struct ScanCtx {
    text_len: u64,
    rev_comp: bool,
    matching_length: u16,
    read_length: u16,
}

#[derive(Clone, Copy)]
struct Candidate {
    read_idx: u32,
    align_pos: u64,
}

trait MatchStrategy {
    /// Feeds every read's patterns into the owned hash matcher.
    fn register_patterns(&mut self, reads: &dyn ReadsSet, matching_length: u16);

    /// Primes a streaming scan over one text view.
    fn scan<'a>(&'a self, text: &'a [u8]) -> HashMatchIter<'a>;

    /// Decodes a raw hash hit into an alignment candidate; `None` rejects it
    /// (out of bounds, duplicate seed, or the read is already settled).
    fn decode_hit(&self, hit: HashMatch, ctx: &ScanCtx, state: &MatchState) -> Option<Candidate>;

    /// Verifies a candidate; `u8::MAX` means it cannot improve the read.
    fn verify_hit(&self, reads: &dyn ReadsSet, text: &[u8], cand: Candidate, ctx: &ScanCtx, state: &MatchState) -> u8;

    /// Folds a verification outcome into the per-read state and counters.
    fn update_best(&self, cand: Candidate, mismatches: u8, ctx: &ScanCtx, state: &mut MatchState);
}

struct ExactStrategy {
    matcher: ConstLenHashMatcher,
}

impl MatchStrategy for ExactStrategy {
    fn register_patterns(&mut self, reads: &dyn ReadsSet, _matching_length: u16) {
        for i in 0..reads.reads_count() {
            self.matcher.add_pattern(reads.read(i), i);
        }
    }

    fn scan<'a>(&'a self, text: &'a [u8]) -> HashMatchIter<'a> {
        self.matcher.iterate_over(text)
    }

    fn decode_hit(&self, hit: HashMatch, _ctx: &ScanCtx, _state: &MatchState) -> Option<Candidate> {
        Some(Candidate { read_idx: hit.pattern_id, align_pos: hit.text_pos })
    }

    fn verify_hit(&self, reads: &dyn ReadsSet, text: &[u8], cand: Candidate, ctx: &ScanCtx, _state: &MatchState) -> u8 {
        let ml = ctx.matching_length as usize;
        let pos = cand.align_pos as usize;
        if reads.read(cand.read_idx)[..ml] == text[pos..pos + ml] {
            0
        } else {
            u8::MAX
        }
    }

    fn update_best(&self, cand: Candidate, mismatches: u8, ctx: &ScanCtx, state: &mut MatchState) {
        if mismatches == u8::MAX {
            state.stats.false_match_count += 1;
            return;
        }
        let r = cand.read_idx as usize;
        let eff = effective_position(ctx.text_len, cand.align_pos, ctx.matching_length, ctx.rev_comp) as u32;
        if state.match_pos[r] == NOT_MATCHED_POSITION {
            state.match_pos[r] = eff;
            state.match_rc[r] = ctx.rev_comp;
            state.mismatches[r] = 0;
            state.stats.matched_reads_count += 1;
        } else if state.match_pos[r] != eff {
            state.stats.multi_match_count += 1;
        }
    }
}

enum SeedMatcher {
    Default(ConstLenHashMatcher),
    Interleaved(InterleavedHashMatcher),
}

struct ApproxStrategy {
    seeds: SeedMatcher,
    parts: u32,
    part_length: u16,
    max_mismatches: u8,
    min_mismatches: u8,
}

impl MatchStrategy for ApproxStrategy {
    fn register_patterns(&mut self, reads: &dyn ReadsSet, _matching_length: u16) {
        let pl = self.part_length as usize;
        for i in 0..reads.reads_count() {
            let read = reads.read(i);
            match &mut self.seeds {
                SeedMatcher::Default(m) => {
                    for j in 0..self.parts {
                        m.add_pattern(&read[j as usize * pl..], i * self.parts + j);
                    }
                }
                SeedMatcher::Interleaved(m) => m.add_read_patterns(read, i),
            }
        }
    }

    fn scan<'a>(&'a self, text: &'a [u8]) -> HashMatchIter<'a> {
        match &self.seeds {
            SeedMatcher::Default(m) => m.iterate_over(text),
            SeedMatcher::Interleaved(m) => m.iterate_over(text),
        }
    }

    fn decode_hit(&self, hit: HashMatch, ctx: &ScanCtx, state: &MatchState) -> Option<Candidate> {
        let read_idx = hit.pattern_id / self.parts;
        let block_idx = hit.pattern_id % self.parts;
        if state.mismatches[read_idx as usize] <= self.min_mismatches {
            return None;
        }
        let shift = block_idx as u64 * self.part_length as u64;
        if shift > hit.text_pos {
            return None;
        }
        let align_pos = hit.text_pos - shift;
        if align_pos + ctx.read_length as u64 > ctx.text_len {
            return None;
        }
        let eff = effective_position(ctx.text_len, align_pos, ctx.matching_length, ctx.rev_comp);
        if state.match_pos[read_idx as usize] as u64 == eff {
            return None;
        }
        Some(Candidate { read_idx, align_pos })
    }

    fn verify_hit(&self, reads: &dyn ReadsSet, text: &[u8], cand: Candidate, ctx: &ScanCtx, state: &MatchState) -> u8 {
        let best = state.mismatches[cand.read_idx as usize];
        let limit = if best == u8::MAX { self.max_mismatches } else { best };
        let ml = ctx.matching_length as usize;
        let pos = cand.align_pos as usize;
        count_mismatches(&reads.read(cand.read_idx)[..ml], &text[pos..pos + ml], limit)
    }

    fn update_best(&self, cand: Candidate, mismatches: u8, ctx: &ScanCtx, state: &mut MatchState) {
        let r = cand.read_idx as usize;
        let best = state.mismatches[r];
        if mismatches == u8::MAX {
            // the counting gave up: past the budget for fresh reads, past the
            // recorded best otherwise
            if best == u8::MAX {
                state.stats.false_match_count += 1;
            } else {
                state.stats.multi_match_count += 1;
            }
            return;
        }
        if mismatches < best {
            if best == u8::MAX {
                state.stats.matched_reads_count += 1;
            } else {
                state.stats.multi_match_count += 1;
            }
            let eff = effective_position(ctx.text_len, cand.align_pos, ctx.matching_length, ctx.rev_comp) as u32;
            state.match_pos[r] = eff;
            state.match_rc[r] = ctx.rev_comp;
            state.mismatches[r] = mismatches;
        } else {
            state.stats.multi_match_count += 1;
        }
    }
}

// ── Reads matcher ────────────────────────────────────────────────────────────

/// Exact/approximate reads-to-pseudogenome matcher with per-read best state.
pub struct ReadsMatcher<'r> {
    reads: &'r dyn ReadsSet,
    cfg: MatchConfig,
    matching_length: u16,
    strategy: Box<dyn MatchStrategy>,
    state: MatchState,
}

impl<'r> ReadsMatcher<'r> {
    /// Picks the strategy from the configuration and sizes the state tables.
    pub fn new(reads: &'r dyn ReadsSet, cfg: MatchConfig) -> Result<Self, PgError> {
        cfg.validate()?;
        let read_length = reads.read_length();
        if read_length == 0 || reads.reads_count() == 0 {
            return Err(PgError::Config("empty reads set".into()));
        }
        let matching_length = match cfg.match_prefix_length {
            Some(p) => read_length.min(p),
            None => read_length,
        };
        let strategy: Box<dyn MatchStrategy> = if cfg.max_mismatches == 0 {
            Box::new(ExactStrategy { matcher: ConstLenHashMatcher::new(matching_length as usize) })
        } else {
            let parts = cfg.seed_parts();
            let part_length = matching_length / parts as u16;
            if part_length == 0 {
                return Err(PgError::Config(format!(
                    "matching length {matching_length} too short for {parts} seed blocks"
                )));
            }
            let seeds = if cfg.interleaved_seeds {
                SeedMatcher::Interleaved(InterleavedHashMatcher::new(part_length as usize, parts))
            } else {
                SeedMatcher::Default(ConstLenHashMatcher::new(part_length as usize))
            };
            Box::new(ApproxStrategy {
                seeds,
                parts,
                part_length,
                max_mismatches: cfg.max_mismatches,
                min_mismatches: cfg.min_mismatches,
            })
        };
        let state = MatchState::new(reads.reads_count());
        Ok(ReadsMatcher { reads, cfg, matching_length, strategy, state })
    }

    pub fn matching_length(&self) -> u16 {
        self.matching_length
    }

    pub fn stats(&self) -> MatchStats {
        self.state.stats
    }

    pub fn matched_reads_count(&self) -> u64 {
        self.state.stats.matched_reads_count
    }

    pub fn read_match_pos(&self) -> &[u32] {
        &self.state.match_pos
    }

    pub fn read_match_rc(&self) -> &[bool] {
        &self.state.match_rc
    }

    pub fn read_mismatches(&self) -> &[u8] {
        &self.state.mismatches
    }

    #[inline]
    pub fn is_matched(&self, read_idx: u32) -> bool {
        self.state.match_pos[read_idx as usize] != NOT_MATCHED_POSITION
    }

    /// Indices of matched reads, in read order.
    pub fn matched_reads_indexes(&self) -> Vec<u32> {
        (0..self.reads.reads_count()).filter(|&i| self.is_matched(i)).collect()
    }

    /// Original-numbering indices of reads left unmatched, in read order.
    pub fn unmatched_original_indexes(&self, mapping: &IndexesMapping) -> Vec<u32> {
        (0..self.reads.reads_count())
            .filter(|&i| !self.is_matched(i))
            .map(|i| mapping.original(i))
            .collect()
    }

    /// Runs the full matching pipeline over `pg`.  When the reverse
    /// complement is enabled the buffer is flipped in place for the second
    /// scan and flipped back afterwards, so only one genome-sized buffer
    /// ever exists.
    pub fn match_reads(&mut self, pg: &mut [u8]) -> Result<(), PgError> {
        if pg.len() as u64 >= NOT_MATCHED_POSITION as u64 {
            return Err(PgError::Config(format!(
                "pseudogenome length {} exceeds the 32-bit position range",
                pg.len()
            )));
        }
        displaylevel!(2, "feeding {} read patterns", self.reads.reads_count());
        self.strategy.register_patterns(self.reads, self.matching_length);

        self.scan_view(pg, false);
        if self.cfg.rev_compl_pg {
            seq::reverse_complement_in_place(pg);
            self.scan_view(pg, true);
            seq::reverse_complement_in_place(pg);
        }

        let s = self.state.stats;
        displaylevel!(
            2,
            "matched {} of {} reads ({} multi-matches, {} false matches)",
            s.matched_reads_count,
            self.reads.reads_count(),
            s.multi_match_count,
            s.false_match_count
        );
        if self.cfg.max_mismatches > 0 {
            let mut histogram = vec![0u64; self.cfg.max_mismatches as usize + 1];
            for &m in &self.state.mismatches {
                if m != u8::MAX {
                    histogram[m as usize] += 1;
                }
            }
            for (m, count) in histogram.iter().enumerate() {
                displaylevel!(3, "matched {count} reads with {m} mismatches");
            }
        }
        Ok(())
    }

    fn scan_view(&mut self, text: &[u8], rev_comp: bool) {
        displaylevel!(2, "matching{}", if rev_comp { " in Pg reverse complement" } else { "" });
        let ctx = ScanCtx {
            text_len: text.len() as u64,
            rev_comp,
            matching_length: self.matching_length,
            read_length: self.reads.read_length(),
        };
        let strategy = &*self.strategy;
        let state = &mut self.state;
        for hit in strategy.scan(text) {
            let Some(cand) = strategy.decode_hit(hit, &ctx, state) else { continue };
            let verdict = strategy.verify_hit(self.reads, text, cand, &ctx, state);
            strategy.update_best(cand, verdict, &ctx, state);
        }
    }

    // ── Mismatch reporting ──────────────────────────────────────────────────

    /// Ordered `(offset within read, substituted base)` pairs for a matched
    /// read, comparing its oriented bytes against the pseudogenome window.
    /// Only the matched prefix is oriented, so the list length always equals
    /// the recorded mismatch count.
    pub fn read_mismatch_list(&self, pg: &[u8], read_idx: u32) -> SmallVec<[(u16, u8); 8]> {
        let ml = self.matching_length as usize;
        let r = read_idx as usize;
        let pos = self.state.match_pos[r] as usize;
        let oriented: Vec<u8> = if self.state.match_rc[r] {
            seq::reverse_complement(&self.reads.read(read_idx)[..ml])
        } else {
            self.reads.read(read_idx)[..ml].to_vec()
        };
        mismatches_between(&oriented, &pg[pos..pos + ml])
    }

    /// Writes the legacy text bundle: matched offsets with inline mismatch
    /// pairs, missed reads verbatim, and matched-read suffixes when a match
    /// prefix is active.
    pub fn write_matches_info(&self, pg: &[u8], out_prefix: &str) -> Result<(), PgError> {
        let offsets_path = format!("{out_prefix}{OFFSETS_DUMP_SUFFIX}");
        let missed_path = format!("{out_prefix}{MISSED_READS_DUMP_SUFFIX}");
        let mut offsets = BufWriter::new(
            File::create(&offsets_path).map_err(|e| PgError::open(&offsets_path, e))?,
        );
        let mut missed = BufWriter::new(
            File::create(&missed_path).map_err(|e| PgError::open(&missed_path, e))?,
        );
        let prefix_mode = self.matching_length < self.reads.read_length();
        let mut suffixes = if prefix_mode {
            let path = format!("{out_prefix}{SUFFIXES_DUMP_SUFFIX}");
            Some(BufWriter::new(File::create(&path).map_err(|e| PgError::open(&path, e))?))
        } else {
            None
        };

        let ml = self.matching_length as usize;
        for i in 0..self.reads.reads_count() {
            if !self.is_matched(i) {
                missed.write_all(self.reads.read(i))?;
                missed.write_all(b"\n")?;
                continue;
            }
            let r = i as usize;
            write!(offsets, "{}\t{}", i, self.state.match_pos[r])?;
            if self.state.match_rc[r] {
                offsets.write_all(b"\tRC")?;
            }
            for (off, base) in self.read_mismatch_list(pg, i) {
                write!(offsets, "\t{}\t{}", off, base as char)?;
            }
            offsets.write_all(b"\n")?;
            if let Some(suffixes) = suffixes.as_mut() {
                suffixes.write_all(&self.reads.read(i)[ml..])?;
            }
        }
        Ok(())
    }

    // ── Separated output ────────────────────────────────────────────────────

    /// Feeds the matched reads list, sorted by pseudogenome position, into
    /// the output builder; mate back-links are attached when `paired`.
    pub fn build_output(
        &self,
        pg: &[u8],
        builder: &mut SeparatedPgOutputBuilder,
        mapping: &IndexesMapping,
        paired: bool,
    ) -> Result<(), PgError> {
        let mut matched: Vec<(u32, u32)> = (0..self.reads.reads_count())
            .filter(|&i| self.is_matched(i))
            .map(|i| (self.state.match_pos[i as usize], i))
            .collect();
        matched.sort_unstable();

        let mut org_order: Vec<u32> = Vec::with_capacity(matched.len());
        for &(pos, read_idx) in &matched {
            let r = read_idx as usize;
            let mut entry = ReadsListEntry::new(
                pos as u64,
                mapping.original(read_idx),
                self.state.match_rc[r],
            );
            if self.state.mismatches[r] != u8::MAX && self.state.mismatches[r] > 0 {
                for (off, base) in self.read_mismatch_list(pg, read_idx) {
                    entry.add_mismatch(off, base);
                }
            }
            builder.write_read_entry(&entry)?;
            org_order.push(mapping.original(read_idx));
        }

        if paired {
            write_pair_mapping(builder, &org_order)?;
        }
        Ok(())
    }

    /// Placeholder for rewriting matched reads back into a pseudogenome;
    /// the semantics are not settled, so the operation only reports itself
    /// as unimplemented.
    pub fn write_into_pseudo_genome(
        &self,
        _out_pg_prefix: &str,
        _mapping: &IndexesMapping,
    ) -> Result<(), PgError> {
        Err(PgError::Unimplemented("write_into_pseudo_genome"))
    }
}

/// Ordered mismatch pairs between two equal-length byte slices.
pub fn mismatches_between(read: &[u8], pg_part: &[u8]) -> SmallVec<[(u16, u8); 8]> {
    debug_assert_eq!(read.len(), pg_part.len());
    let mut out = SmallVec::new();
    for (off, (&r, &p)) in read.iter().zip(pg_part).enumerate() {
        if r != p {
            out.push((off as u16, r));
        }
    }
    out
}

/// Walks the matched list in order and back-links the second member of each
/// read pair (`idx ^ 1` mates) to its mate's list slot.
fn write_pair_mapping(builder: &mut SeparatedPgOutputBuilder, org_order: &[u32]) -> Result<(), PgError> {
    let mut first_slot: ahash::AHashMap<u32, (u64, u32)> = ahash::AHashMap::new();
    for (slot, &org_idx) in org_order.iter().enumerate() {
        let pair_key = org_idx / 2;
        match first_slot.get(&pair_key) {
            None => {
                first_slot.insert(pair_key, (slot as u64, org_idx));
            }
            Some(&(mate_slot, mate_idx)) => {
                let first_is_even = mate_idx % 2 == 0;
                builder.write_pair_entry(mate_slot as u32, slot as u64 - mate_slot, first_is_even)?;
            }
        }
    }
    Ok(())
}

// ── Orchestration ────────────────────────────────────────────────────────────

/// Runs the full reads-mapping pipeline against the pseudogenome under
/// `pg_prefix`: match, optionally dump the legacy text bundle, build the
/// separated output under `dest_pg_prefix`, and write the division of
/// unmatched reads.
#[allow(clippy::too_many_arguments)]
pub fn map_reads_into_pg(
    pg_prefix: &str,
    reads: &dyn ReadsSet,
    mapping: &IndexesMapping,
    cfg: &MatchConfig,
    opts: &WriteOptions,
    dump_info: bool,
    dest_pg_prefix: &str,
    out_division_file: &Path,
    paired: bool,
) -> Result<MatchStats, PgError> {
    let mut pg = load_pseudo_genome(pg_prefix)?;
    let mut matcher = ReadsMatcher::new(reads, cfg.clone())?;
    matcher.match_reads(&mut pg)?;

    if dump_info {
        matcher.write_matches_info(&pg, dest_pg_prefix)?;
    }

    let props = PgProperties {
        reads_count: matcher.matched_reads_count(),
        pg_length: pg.len() as u64,
        read_length: reads.read_length(),
        constant_read_length: true,
    };
    let mut opts = opts.clone();
    opts.pair_streams = paired;
    let mut builder =
        SeparatedPgOutputBuilder::on_the_fly(dest_pg_prefix, opts, matcher.matching_length())?;
    builder.write_pseudo_genome(&pg)?;
    builder.set_properties(props);
    matcher.build_output(&pg, &mut builder, mapping, paired)?;
    builder.build()?;

    write_division(out_division_file, &matcher.unmatched_original_indexes(mapping))?;
    Ok(matcher.stats())
}
