//! The `_prop.pg` header record.

use std::io::{self, Read, Write};

use crate::error::PgError;
use crate::util::{read_value, write_value};

const BINARY_MODE_MARK: u8 = b'B';
const PLAIN_TEXT_MODE_MARK: u8 = b'T';

/// Properties of a separated pseudogenome bundle.
///
/// The on-disk layout starts with a one-byte mode mark (`B` binary, `T`
/// plain text) so readers recover the numeric write mode without side
/// channels, followed by reads count, sequence length, read length and the
/// constant-length flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgProperties {
    pub reads_count: u64,
    pub pg_length: u64,
    pub read_length: u16,
    pub constant_read_length: bool,
}

impl PgProperties {
    pub fn write<W: Write + ?Sized>(&self, dest: &mut W, plain_text: bool) -> io::Result<()> {
        let mark = if plain_text { PLAIN_TEXT_MODE_MARK } else { BINARY_MODE_MARK };
        dest.write_all(&[mark])?;
        write_value(dest, self.reads_count, plain_text)?;
        write_value(dest, self.pg_length, plain_text)?;
        write_value(dest, self.read_length, plain_text)?;
        write_value(dest, self.constant_read_length as u8, plain_text)
    }

    /// Reads a header back, returning the record and whether the bundle was
    /// written in plain-text mode.
    pub fn read<R: Read + ?Sized>(src: &mut R) -> Result<(Self, bool), PgError> {
        let mut mark = [0u8; 1];
        src.read_exact(&mut mark)?;
        let plain_text = match mark[0] {
            PLAIN_TEXT_MODE_MARK => true,
            BINARY_MODE_MARK => false,
            other => {
                return Err(PgError::Inconsistent(format!(
                    "unknown properties mode mark {other:#04x}"
                )))
            }
        };
        let reads_count = read_value(src, plain_text)?;
        let pg_length = read_value(src, plain_text)?;
        let read_length = read_value(src, plain_text)?;
        let constant: u8 = read_value(src, plain_text)?;
        Ok((
            PgProperties {
                reads_count,
                pg_length,
                read_length,
                constant_read_length: constant != 0,
            },
            plain_text,
        ))
    }
}
