//! One entry of the matched reads list.

use smallvec::SmallVec;

/// A matched read as it travels into the output builder: forward-strand
/// position, original read index, strand flag, and the ordered mismatch
/// pairs against the pseudogenome window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadsListEntry {
    pub pos: u64,
    pub idx: u32,
    pub rev_comp: bool,
    pub mismatches: SmallVec<[(u16, u8); 8]>,
}

impl ReadsListEntry {
    pub fn new(pos: u64, idx: u32, rev_comp: bool) -> Self {
        ReadsListEntry { pos, idx, rev_comp, mismatches: SmallVec::new() }
    }

    /// Appends one `(offset within read, substituted base)` pair; offsets
    /// must arrive in increasing order.
    pub fn add_mismatch(&mut self, offset: u16, base: u8) {
        debug_assert!(self.mismatches.last().map_or(true, |&(o, _)| o < offset));
        self.mismatches.push((offset, base));
    }

    pub fn mismatches_count(&self) -> u8 {
        self.mismatches.len() as u8
    }
}
