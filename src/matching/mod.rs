//! Matching subsystem.
//!
//! - [`hash_matcher`] — constant-length multi-pattern matcher: registers
//!   equal-length patterns in a fingerprint table and streams candidate
//!   `(text position, pattern id)` pairs over a long text.  Callers verify.
//! - [`reads_matcher`] — exact and approximate (q-gram partition) matching of
//!   fixed-length reads against a pseudogenome, with per-read best-match
//!   state and the separated-output build step.
//! - [`pg_matcher`] — long-substring matching between two pseudogenomes and
//!   the copy-directive rewrite of the target.

pub mod hash_matcher;
pub mod pg_matcher;
pub mod reads_matcher;
