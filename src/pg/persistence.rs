//! File-bundle conventions: element suffixes, open helpers, and the
//! temporary-file accept protocol.
//!
//! Every element of a bundle lives at `prefix + suffix`.  Writers create
//! `prefix + suffix + ".temp"`; [`accept_temporary`] promotes one element and
//! [`accept_temporaries`] promotes the whole reads-list family in a fixed
//! order.  A missing temporary is not an error — the element was simply not
//! part of this build.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};

use crate::error::PgError;
use crate::pg::properties::PgProperties;

// ── Element suffixes ─────────────────────────────────────────────────────────

pub const PSEUDOGENOME_FILE_SUFFIX: &str = ".pg";
pub const PSEUDOGENOME_PROPERTIES_SUFFIX: &str = "_prop.pg";
pub const READSLIST_POSITIONS_FILE_SUFFIX: &str = "_rl_pos.pg";
pub const READSLIST_OFFSETS_FILE_SUFFIX: &str = "_rl_off.pg";
pub const READSLIST_ORIGINAL_INDEXES_FILE_SUFFIX: &str = "_rl_idx.pg";
pub const READSLIST_REVERSECOMPL_FILE_SUFFIX: &str = "_rl_rc.pg";
pub const READSLIST_MISMATCHES_COUNT_FILE_SUFFIX: &str = "_rl_mis_cnt.pg";
pub const READSLIST_MISMATCHED_SYMBOLS_FILE_SUFFIX: &str = "_rl_mis_sym.pg";
pub const READSLIST_MISMATCHES_POSITIONS_FILE_SUFFIX: &str = "_rl_mis_pos.pg";
pub const READSLIST_MISMATCHES_REVOFFSETS_FILE_SUFFIX: &str = "_rl_mis_roff.pg";
pub const PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX: &str = "_map_off.pg";
pub const PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX: &str = "_map_len.pg";
pub const READSLIST_PAIR_FIRST_INDEXES_FILE_SUFFIX: &str = "_rl_pr_idx.pg";
pub const READSLIST_PAIR_FIRST_OFFSETS_FILE_SUFFIX: &str = "_rl_pr_off.pg";
pub const READSLIST_PAIR_FIRST_SOURCE_FLAG_FILE_SUFFIX: &str = "_rl_pr_sf.pg";

pub const TEMPORARY_FILE_SUFFIX: &str = ".temp";

/// Reads-list family promoted by [`accept_temporaries`], in rename order.
const READSLIST_FAMILY: &[&str] = &[
    PSEUDOGENOME_FILE_SUFFIX,
    PSEUDOGENOME_PROPERTIES_SUFFIX,
    READSLIST_POSITIONS_FILE_SUFFIX,
    READSLIST_OFFSETS_FILE_SUFFIX,
    READSLIST_ORIGINAL_INDEXES_FILE_SUFFIX,
    READSLIST_REVERSECOMPL_FILE_SUFFIX,
    READSLIST_MISMATCHES_COUNT_FILE_SUFFIX,
    READSLIST_MISMATCHED_SYMBOLS_FILE_SUFFIX,
    READSLIST_MISMATCHES_POSITIONS_FILE_SUFFIX,
    READSLIST_MISMATCHES_REVOFFSETS_FILE_SUFFIX,
    PSEUDOGENOME_MAPPING_OFFSETS_FILE_SUFFIX,
    PSEUDOGENOME_MAPPING_LENGTHS_FILE_SUFFIX,
    READSLIST_PAIR_FIRST_INDEXES_FILE_SUFFIX,
    READSLIST_PAIR_FIRST_OFFSETS_FILE_SUFFIX,
    READSLIST_PAIR_FIRST_SOURCE_FLAG_FILE_SUFFIX,
];

// ── Open helpers ─────────────────────────────────────────────────────────────

/// Final path of a bundle element.
pub fn element_path(prefix: &str, suffix: &str) -> String {
    format!("{prefix}{suffix}")
}

/// Opens a bundle element for reading.
pub fn element_src(prefix: &str, suffix: &str) -> Result<BufReader<File>, PgError> {
    let path = element_path(prefix, suffix);
    let file = File::open(&path).map_err(|e| PgError::open(&path, e))?;
    Ok(BufReader::new(file))
}

/// Creates a bundle element for writing, optionally under its `.temp` name.
pub fn element_dest(prefix: &str, suffix: &str, temporary: bool) -> Result<BufWriter<File>, PgError> {
    let mut path = element_path(prefix, suffix);
    if temporary {
        path.push_str(TEMPORARY_FILE_SUFFIX);
    }
    let file = File::create(&path).map_err(|e| PgError::open(&path, e))?;
    Ok(BufWriter::new(file))
}

// ── Temporary-file accept protocol ───────────────────────────────────────────

/// Promotes one temporary element to its final name.  Returns `false` when
/// no temporary exists for this element.
pub fn accept_temporary(prefix: &str, suffix: &str) -> io::Result<bool> {
    let final_path = element_path(prefix, suffix);
    let temp_path = format!("{final_path}{TEMPORARY_FILE_SUFFIX}");
    if !fs::metadata(&temp_path).map(|m| m.is_file()).unwrap_or(false) {
        return Ok(false);
    }
    match fs::remove_file(&final_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(&temp_path, &final_path)?;
    Ok(true)
}

/// Promotes every reads-list-family temporary under `prefix`, in fixed order.
pub fn accept_temporaries(prefix: &str) -> io::Result<()> {
    for suffix in READSLIST_FAMILY {
        accept_temporary(prefix, suffix)?;
    }
    Ok(())
}

// ── Whole-sequence helpers ───────────────────────────────────────────────────

/// Loads the raw pseudogenome sequence stored under `prefix`.
pub fn load_pseudo_genome(prefix: &str) -> Result<Vec<u8>, PgError> {
    let path = element_path(prefix, PSEUDOGENOME_FILE_SUFFIX);
    fs::read(&path).map_err(|e| PgError::open(&path, e))
}

/// Loads the properties header stored under `prefix`, together with its
/// plain-text flag.
pub fn load_properties(prefix: &str) -> Result<(PgProperties, bool), PgError> {
    let mut src = element_src(prefix, PSEUDOGENOME_PROPERTIES_SUFFIX)?;
    PgProperties::read(&mut src)
}

/// Stores a raw pseudogenome sequence under `prefix`, through a temporary.
pub fn write_pseudo_genome_sequence(pg: &[u8], prefix: &str) -> Result<(), PgError> {
    let temp = format!(
        "{}{TEMPORARY_FILE_SUFFIX}",
        element_path(prefix, PSEUDOGENOME_FILE_SUFFIX)
    );
    fs::write(&temp, pg).map_err(|e| PgError::open(&temp, e))?;
    accept_temporary(prefix, PSEUDOGENOME_FILE_SUFFIX)?;
    Ok(())
}
