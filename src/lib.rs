// pgmatch — pseudogenome read-matching core

pub mod cli;
pub mod compress;
pub mod error;
pub mod matching;
pub mod pg;
pub mod reads;
pub mod seq;
pub mod util;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Crate-wide error type.
pub use error::PgError;

/// Constant-length multi-pattern matcher over a long text.
pub use matching::hash_matcher::ConstLenHashMatcher;
/// Seed-grouped variant used by the approximate reads matcher.
pub use matching::hash_matcher::InterleavedHashMatcher;

/// Exact/approximate reads-to-pseudogenome matcher.
pub use matching::reads_matcher::ReadsMatcher;
/// Full reads-matching pipeline: match, dump, build the separated output.
pub use matching::reads_matcher::map_reads_into_pg;
/// Matching configuration record (mismatch budgets, prefix length, strands).
pub use matching::reads_matcher::MatchConfig;

/// Pseudogenome-vs-pseudogenome long-substring matcher and rewriter.
pub use matching::pg_matcher::PgMatcher;
/// Match both pseudogenome prefixes against the first one's sequence.
pub use matching::pg_matcher::match_pg_in_pg_files;

/// Multi-stream writer for the separated reads-list bundle.
pub use pg::output_builder::SeparatedPgOutputBuilder;
/// Output representation choices threaded through builders.
pub use pg::output_builder::WriteOptions;

/// Loads a raw pseudogenome sequence for a file prefix.
pub use pg::persistence::load_pseudo_genome;

/// Fixed-length reads container abstraction.
pub use reads::ReadsSet;
/// One-read-per-line reads container.
pub use reads::PlainReadsSet;
