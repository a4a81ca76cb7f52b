//! Constant-length multi-pattern matching over a long text.
//!
//! Patterns of one fixed window length are registered under caller-chosen
//! ids; iterating over a text then yields every `(text position, pattern id)`
//! pair whose fingerprints collide.  No byte verification happens here —
//! false hits are expected and resolved by the caller, so the only contract
//! is that a text window equal to a registered pattern is always reported.
//!
//! The fingerprint is a polynomial rolling hash in wrapping `u64`
//! arithmetic, advanced in O(1) per text position.  Registered fingerprints
//! live in an open-addressed power-of-two table with linear probing;
//! duplicate fingerprints chain along the probe sequence in registration
//! order, which keeps the emission order deterministic.
//!
//! Two front-ends share the table:
//!
//! - [`ConstLenHashMatcher`] registers patterns at arbitrary ids (whole
//!   reads, or every window of a source text);
//! - [`InterleavedHashMatcher`] registers the seed blocks of one read as a
//!   contiguous group, so one text window probes all of a read's seeds
//!   through neighboring slots; ids encode `read * parts + part`.

/// One candidate emitted by the scan; bytes are unverified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashMatch {
    pub text_pos: u64,
    pub pattern_id: u32,
}

const HASH_BASE: u64 = 257;
const EMPTY_SLOT: u32 = u32::MAX;
const INITIAL_SHIFT: u32 = 10;

// ── Fingerprint table ────────────────────────────────────────────────────────

struct FingerprintTable {
    window_len: usize,
    /// `HASH_BASE ^ (window_len - 1)`, the weight of the byte leaving the window.
    pow_msb: u64,
    shift: u32,
    mask: usize,
    hashes: Vec<u64>,
    ids: Vec<u32>,
    /// Registration log; rebuilds preserve this order so probe chains stay stable.
    log: Vec<(u64, u32)>,
}

impl FingerprintTable {
    fn new(window_len: usize) -> Self {
        assert!(window_len > 0, "zero-length matching window");
        let mut pow_msb = 1u64;
        for _ in 1..window_len {
            pow_msb = pow_msb.wrapping_mul(HASH_BASE);
        }
        let capacity = 1usize << INITIAL_SHIFT;
        FingerprintTable {
            window_len,
            pow_msb,
            shift: INITIAL_SHIFT,
            mask: capacity - 1,
            hashes: vec![0; capacity],
            ids: vec![EMPTY_SLOT; capacity],
            log: Vec::new(),
        }
    }

    fn fingerprint(&self, window: &[u8]) -> u64 {
        let mut h = 0u64;
        for &b in &window[..self.window_len] {
            h = h.wrapping_mul(HASH_BASE).wrapping_add(b as u64);
        }
        h
    }

    /// Rolls the window fingerprint one byte forward.
    #[inline]
    fn roll(&self, hash: u64, leaving: u8, entering: u8) -> u64 {
        hash.wrapping_sub((leaving as u64).wrapping_mul(self.pow_msb))
            .wrapping_mul(HASH_BASE)
            .wrapping_add(entering as u64)
    }

    #[inline]
    fn slot_of(&self, hash: u64) -> usize {
        (hash.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> (64 - self.shift)) as usize
    }

    fn insert(&mut self, hash: u64, id: u32) {
        debug_assert_ne!(id, EMPTY_SLOT, "reserved pattern id");
        if (self.log.len() + 1) * 2 > self.hashes.len() {
            self.grow();
        }
        self.log.push((hash, id));
        self.place(hash, id);
    }

    fn place(&mut self, hash: u64, id: u32) {
        let mut slot = self.slot_of(hash);
        while self.ids[slot] != EMPTY_SLOT {
            slot = (slot + 1) & self.mask;
        }
        self.hashes[slot] = hash;
        self.ids[slot] = id;
    }

    fn grow(&mut self) {
        self.shift += 1;
        let capacity = 1usize << self.shift;
        self.mask = capacity - 1;
        self.hashes = vec![0; capacity];
        self.ids = vec![EMPTY_SLOT; capacity];
        let log = std::mem::take(&mut self.log);
        for &(hash, id) in &log {
            self.place(hash, id);
        }
        self.log = log;
    }

    fn iterate_over<'a>(&'a self, text: &'a [u8]) -> HashMatchIter<'a> {
        let runnable = !self.log.is_empty() && text.len() >= self.window_len;
        let hash = if runnable { self.fingerprint(text) } else { 0 };
        let mut iter = HashMatchIter { table: self, text, pos: 0, hash, probe: None, done: !runnable };
        if runnable {
            iter.probe = Some(self.slot_of(hash));
        }
        iter
    }
}

// ── Streaming iterator ───────────────────────────────────────────────────────

/// Streams fingerprint collisions over one text, in ascending text position;
/// collisions at the same position come out in pattern-registration order
/// along the probe chain.
pub struct HashMatchIter<'a> {
    table: &'a FingerprintTable,
    text: &'a [u8],
    pos: usize,
    hash: u64,
    probe: Option<usize>,
    done: bool,
}

impl Iterator for HashMatchIter<'_> {
    type Item = HashMatch;

    fn next(&mut self) -> Option<HashMatch> {
        while !self.done {
            if let Some(mut slot) = self.probe {
                while self.table.ids[slot] != EMPTY_SLOT {
                    let hit = self.table.hashes[slot] == self.hash;
                    let id = self.table.ids[slot];
                    slot = (slot + 1) & self.table.mask;
                    if hit {
                        self.probe = Some(slot);
                        return Some(HashMatch { text_pos: self.pos as u64, pattern_id: id });
                    }
                }
                self.probe = None;
            }
            // advance the window
            let next_end = self.pos + self.table.window_len;
            if next_end >= self.text.len() {
                self.done = true;
                return None;
            }
            self.hash = self.table.roll(self.hash, self.text[self.pos], self.text[next_end]);
            self.pos += 1;
            self.probe = Some(self.table.slot_of(self.hash));
        }
        None
    }
}

// ── Default front-end ────────────────────────────────────────────────────────

/// Multi-pattern matcher for patterns registered at arbitrary ids.
pub struct ConstLenHashMatcher {
    table: FingerprintTable,
}

impl ConstLenHashMatcher {
    /// Creates a matcher for patterns of exactly `window_len` bytes.
    pub fn new(window_len: usize) -> Self {
        ConstLenHashMatcher { table: FingerprintTable::new(window_len) }
    }

    pub fn window_len(&self) -> usize {
        self.table.window_len
    }

    pub fn pattern_count(&self) -> usize {
        self.table.log.len()
    }

    /// Registers the first `window_len` bytes of `pattern` under `id`.
    pub fn add_pattern(&mut self, pattern: &[u8], id: u32) {
        debug_assert!(pattern.len() >= self.table.window_len);
        let hash = self.table.fingerprint(pattern);
        self.table.insert(hash, id);
    }

    /// Registers every window of `text`, using its start position as the id.
    /// One rolling pass, so feeding a whole pseudogenome stays linear.
    pub fn add_text_patterns(&mut self, text: &[u8]) {
        let w = self.table.window_len;
        if text.len() < w {
            return;
        }
        debug_assert!(text.len() - w < EMPTY_SLOT as usize);
        let mut hash = self.table.fingerprint(text);
        self.table.insert(hash, 0);
        for pos in 1..=text.len() - w {
            hash = self.table.roll(hash, text[pos - 1], text[pos + w - 1]);
            self.table.insert(hash, pos as u32);
        }
    }

    /// Primes a streaming scan of `text`.
    pub fn iterate_over<'a>(&'a self, text: &'a [u8]) -> HashMatchIter<'a> {
        self.table.iterate_over(text)
    }
}

// ── Interleaved front-end ────────────────────────────────────────────────────

/// Variant for q-gram partition seeding: the `parts` seed blocks of one read
/// are registered back to back, so their table slots cluster and a single
/// text window tests all of them with neighboring probes.
pub struct InterleavedHashMatcher {
    table: FingerprintTable,
    parts: u32,
}

impl InterleavedHashMatcher {
    /// `window_len` is the seed-block length; `parts` is the number of blocks
    /// registered per read.
    pub fn new(window_len: usize, parts: u32) -> Self {
        assert!(parts > 0);
        InterleavedHashMatcher { table: FingerprintTable::new(window_len), parts }
    }

    pub fn window_len(&self) -> usize {
        self.table.window_len
    }

    /// Registers the seed blocks of `read` at stride `window_len`; block `j`
    /// gets pattern id `read_idx * parts + j`.
    pub fn add_read_patterns(&mut self, read: &[u8], read_idx: u32) {
        let w = self.table.window_len;
        debug_assert!(read.len() >= w * self.parts as usize);
        for j in 0..self.parts {
            let block = &read[j as usize * w..];
            let hash = self.table.fingerprint(block);
            self.table.insert(hash, read_idx * self.parts + j);
        }
    }

    /// Splits a pattern id back into `(read index, block index)`.
    #[inline]
    pub fn decode(&self, pattern_id: u32) -> (u32, u32) {
        (pattern_id / self.parts, pattern_id % self.parts)
    }

    /// Primes a streaming scan of `text`.
    pub fn iterate_over<'a>(&'a self, text: &'a [u8]) -> HashMatchIter<'a> {
        self.table.iterate_over(text)
    }
}
