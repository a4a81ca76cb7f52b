//! Multi-stream writer for the separated reads-list bundle.
//!
//! One [`ColumnSink`] per enabled column, all written in lockstep by
//! [`SeparatedPgOutputBuilder::write_read_entry`].  Two sink families:
//!
//! - **on-the-fly** — every column is a buffered file stream targeting
//!   `name + ".temp"`; [`SeparatedPgOutputBuilder::build`] validates the
//!   reads count against the properties header, flushes, and promotes the
//!   temporaries in fixed column order;
//! - **buffered** — every column is an in-memory buffer;
//!   [`SeparatedPgOutputBuilder::build_to`] writes the buffers as files, and
//!   [`SeparatedPgOutputBuilder::compressed_build`] stages them through the
//!   compression driver instead (presence byte per column, then its framed
//!   block; the mismatch-positions column goes through the stratified path).

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use crate::compress::{
    write_compressed, write_mismatch_offsets_stratified, CoderLevel, CoderSpec,
    DATA_PERIOD_CODE_16, DATA_PERIOD_CODE_32, DATA_PERIOD_CODE_8,
};
use crate::error::PgError;
use crate::pg::persistence::{self, accept_temporary, TEMPORARY_FILE_SUFFIX};
use crate::pg::properties::PgProperties;
use crate::pg::reads_list::ReadsListEntry;
use crate::util::{write_uint_byte_frugal, write_value};

// ── Write options ────────────────────────────────────────────────────────────

/// Output representation choices, threaded through constructors instead of
/// living in process-wide flags.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Store absolute read positions instead of deltas between neighbors.
    pub absolute_positions: bool,
    /// Store mismatch positions as offsets from the read's end, tail first.
    pub rev_offset_mismatches: bool,
    /// ASCII-decimal numbers instead of little-endian binary.
    pub plain_text: bool,
    /// Skip the reverse-complement flag column.
    pub disable_rev_comp: bool,
    /// Skip the three mismatch columns.
    pub disable_mismatches: bool,
    /// Open the pair-mapping columns.
    pub pair_streams: bool,
}

// ── Columns ──────────────────────────────────────────────────────────────────

/// Column ids of the separated bundle, in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Pg,
    Props,
    Pos,
    Idx,
    RevComp,
    MisCnt,
    MisSym,
    MisPos,
    PairIdx,
    PairOff,
    PairSf,
}

pub const COLUMN_COUNT: usize = 11;

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Pg,
        Column::Props,
        Column::Pos,
        Column::Idx,
        Column::RevComp,
        Column::MisCnt,
        Column::MisSym,
        Column::MisPos,
        Column::PairIdx,
        Column::PairOff,
        Column::PairSf,
    ];

    /// File suffix of this column under the given representation choices.
    pub fn suffix(self, opts: &WriteOptions) -> &'static str {
        match self {
            Column::Pg => persistence::PSEUDOGENOME_FILE_SUFFIX,
            Column::Props => persistence::PSEUDOGENOME_PROPERTIES_SUFFIX,
            Column::Pos => {
                if opts.absolute_positions {
                    persistence::READSLIST_POSITIONS_FILE_SUFFIX
                } else {
                    persistence::READSLIST_OFFSETS_FILE_SUFFIX
                }
            }
            Column::Idx => persistence::READSLIST_ORIGINAL_INDEXES_FILE_SUFFIX,
            Column::RevComp => persistence::READSLIST_REVERSECOMPL_FILE_SUFFIX,
            Column::MisCnt => persistence::READSLIST_MISMATCHES_COUNT_FILE_SUFFIX,
            Column::MisSym => persistence::READSLIST_MISMATCHED_SYMBOLS_FILE_SUFFIX,
            Column::MisPos => {
                if opts.rev_offset_mismatches {
                    persistence::READSLIST_MISMATCHES_REVOFFSETS_FILE_SUFFIX
                } else {
                    persistence::READSLIST_MISMATCHES_POSITIONS_FILE_SUFFIX
                }
            }
            Column::PairIdx => persistence::READSLIST_PAIR_FIRST_INDEXES_FILE_SUFFIX,
            Column::PairOff => persistence::READSLIST_PAIR_FIRST_OFFSETS_FILE_SUFFIX,
            Column::PairSf => persistence::READSLIST_PAIR_FIRST_SOURCE_FLAG_FILE_SUFFIX,
        }
    }

    fn enabled(self, opts: &WriteOptions) -> bool {
        match self {
            Column::Pg | Column::Props | Column::Pos | Column::Idx => true,
            Column::RevComp => !opts.disable_rev_comp,
            Column::MisCnt | Column::MisSym | Column::MisPos => !opts.disable_mismatches,
            Column::PairIdx | Column::PairOff | Column::PairSf => opts.pair_streams,
        }
    }
}

// ── Column sinks ─────────────────────────────────────────────────────────────

/// One output stream of the bundle.
pub trait ColumnSink: Write {
    /// Flushes pending bytes ahead of the promote step.
    fn finish(&mut self) -> io::Result<()>;
    /// Promotes the temporary file to its final name; no-op for buffers.
    fn commit(&mut self) -> io::Result<()>;
    /// Drains the in-memory buffer; `None` for file sinks.
    fn take_buffer(&mut self) -> Option<Vec<u8>>;
    /// Peeks at the in-memory buffer; `None` for file sinks.
    fn buffer(&self) -> Option<&[u8]>;
}

/// File-backed sink writing through `path + ".temp"`.
pub struct FileColumnSink {
    writer: Option<BufWriter<File>>,
    prefix: String,
    suffix: &'static str,
}

impl FileColumnSink {
    fn open(prefix: &str, suffix: &'static str) -> Result<Self, PgError> {
        let writer = persistence::element_dest(prefix, suffix, true)?;
        Ok(FileColumnSink { writer: Some(writer), prefix: prefix.to_owned(), suffix })
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "column already committed"))
    }
}

impl Write for FileColumnSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl ColumnSink for FileColumnSink {
    fn finish(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }

    fn commit(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.into_inner().map_err(|e| e.into_error())?;
        }
        accept_temporary(&self.prefix, self.suffix)?;
        Ok(())
    }

    fn take_buffer(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn buffer(&self) -> Option<&[u8]> {
        None
    }
}

/// In-memory sink feeding the compression driver or a late file dump.
#[derive(Default)]
pub struct BufferColumnSink {
    buf: Vec<u8>,
}

impl Write for BufferColumnSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ColumnSink for BufferColumnSink {
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn take_buffer(&mut self) -> Option<Vec<u8>> {
        Some(std::mem::take(&mut self.buf))
    }

    fn buffer(&self) -> Option<&[u8]> {
        Some(&self.buf)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Lockstep writer of the separated reads-list bundle.
pub struct SeparatedPgOutputBuilder {
    opts: WriteOptions,
    matching_length: u16,
    sinks: Vec<Option<Box<dyn ColumnSink>>>,
    prefix: Option<String>,
    last_written_pos: u64,
    reads_counter: u64,
    /// Mismatch counts in entry order, kept for the stratified staging.
    mis_counts: Vec<u8>,
    props: Option<PgProperties>,
}

impl SeparatedPgOutputBuilder {
    /// Opens every enabled column as a `.temp` file stream under `prefix`.
    pub fn on_the_fly(
        prefix: &str,
        opts: WriteOptions,
        matching_length: u16,
    ) -> Result<Self, PgError> {
        let mut sinks: Vec<Option<Box<dyn ColumnSink>>> = Vec::with_capacity(COLUMN_COUNT);
        for column in Column::ALL {
            if column.enabled(&opts) {
                sinks.push(Some(Box::new(FileColumnSink::open(prefix, column.suffix(&opts))?)));
            } else {
                sinks.push(None);
            }
        }
        Ok(SeparatedPgOutputBuilder {
            opts,
            matching_length,
            sinks,
            prefix: Some(prefix.to_owned()),
            last_written_pos: 0,
            reads_counter: 0,
            mis_counts: Vec::new(),
            props: None,
        })
    }

    /// Keeps every enabled column in memory.
    pub fn buffered(opts: WriteOptions, matching_length: u16) -> Self {
        let mut sinks: Vec<Option<Box<dyn ColumnSink>>> = Vec::with_capacity(COLUMN_COUNT);
        for column in Column::ALL {
            if column.enabled(&opts) {
                sinks.push(Some(Box::<BufferColumnSink>::default()));
            } else {
                sinks.push(None);
            }
        }
        SeparatedPgOutputBuilder {
            opts,
            matching_length,
            sinks,
            prefix: None,
            last_written_pos: 0,
            reads_counter: 0,
            mis_counts: Vec::new(),
            props: None,
        }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.opts
    }

    pub fn reads_counter(&self) -> u64 {
        self.reads_counter
    }

    /// Peeks at a buffered column's current bytes.
    pub fn column_bytes(&self, column: Column) -> Option<&[u8]> {
        self.sinks[column as usize].as_ref().and_then(|s| s.buffer())
    }

    fn sink_mut(&mut self, column: Column) -> Result<&mut dyn ColumnSink, PgError> {
        match self.sinks[column as usize].as_deref_mut() {
            Some(sink) => Ok(sink),
            None => Err(PgError::Inconsistent(format!("column {column:?} is disabled"))),
        }
    }

    /// Bytes per mismatch-position element for the current matching length.
    pub fn mis_pos_width(&self) -> usize {
        if self.matching_length as u32 <= 256 {
            1
        } else {
            2
        }
    }

    // ── Writing ─────────────────────────────────────────────────────────────

    /// Streams the raw pseudogenome bytes.
    pub fn write_pseudo_genome(&mut self, pg: &[u8]) -> Result<(), PgError> {
        self.sink_mut(Column::Pg)?.write_all(pg)?;
        Ok(())
    }

    /// Registers the properties header written at build time.
    pub fn set_properties(&mut self, props: PgProperties) {
        self.props = Some(props);
    }

    /// Writes one matched read across all enabled columns.  Entries must
    /// arrive in ascending pseudogenome position.
    pub fn write_read_entry(&mut self, entry: &ReadsListEntry) -> Result<(), PgError> {
        let plain_text = self.opts.plain_text;
        if self.opts.absolute_positions {
            write_value::<u32, _>(self.sink_mut(Column::Pos)?, entry.pos as u32, plain_text)?;
        } else {
            if entry.pos < self.last_written_pos {
                return Err(PgError::Inconsistent(format!(
                    "reads list out of order: {} after {}",
                    entry.pos, self.last_written_pos
                )));
            }
            let delta = entry.pos - self.last_written_pos;
            write_uint_byte_frugal(self.sink_mut(Column::Pos)?, delta, plain_text)?;
        }
        self.last_written_pos = entry.pos;

        write_value::<u32, _>(self.sink_mut(Column::Idx)?, entry.idx, plain_text)?;
        if !self.opts.disable_rev_comp {
            write_value::<u8, _>(self.sink_mut(Column::RevComp)?, entry.rev_comp as u8, plain_text)?;
        }
        if !self.opts.disable_mismatches {
            let count = entry.mismatches_count();
            write_value::<u8, _>(self.sink_mut(Column::MisCnt)?, count, plain_text)?;
            self.mis_counts.push(count);

            let matching_length = self.matching_length;
            let rev = self.opts.rev_offset_mismatches;
            let wide = self.mis_pos_width() == 2;
            let ordered: Vec<(u16, u8)> = if rev {
                entry
                    .mismatches
                    .iter()
                    .rev()
                    .map(|&(off, base)| (matching_length - 1 - off, base))
                    .collect()
            } else {
                entry.mismatches.iter().copied().collect()
            };
            for (off, base) in ordered {
                self.sink_mut(Column::MisSym)?.write_all(&[base])?;
                if wide {
                    write_value::<u16, _>(self.sink_mut(Column::MisPos)?, off, plain_text)?;
                } else {
                    write_value::<u8, _>(self.sink_mut(Column::MisPos)?, off as u8, plain_text)?;
                }
            }
        }
        self.reads_counter += 1;
        Ok(())
    }

    /// Writes one mate back-link: the mate's list slot, the slot distance,
    /// and whether the earlier entry is the first-in-pair read.
    pub fn write_pair_entry(
        &mut self,
        mate_slot: u32,
        distance: u64,
        first_is_even: bool,
    ) -> Result<(), PgError> {
        let plain_text = self.opts.plain_text;
        write_value::<u32, _>(self.sink_mut(Column::PairIdx)?, mate_slot, plain_text)?;
        write_uint_byte_frugal(self.sink_mut(Column::PairOff)?, distance, plain_text)?;
        write_value::<u8, _>(self.sink_mut(Column::PairSf)?, first_is_even as u8, plain_text)?;
        Ok(())
    }

    // ── Building ────────────────────────────────────────────────────────────

    /// Writes the properties column and validates the reads count against it.
    fn seal(&mut self) -> Result<(), PgError> {
        let props = self
            .props
            .take()
            .ok_or_else(|| PgError::Inconsistent("building without properties".into()))?;
        if props.reads_count != self.reads_counter {
            return Err(PgError::Inconsistent(format!(
                "reads count mismatch while building separated Pg ({} instead of {})",
                self.reads_counter, props.reads_count
            )));
        }
        let plain_text = self.opts.plain_text;
        props.write(self.sink_mut(Column::Props)?, plain_text)?;
        Ok(())
    }

    /// Seals and promotes an on-the-fly bundle: either every column becomes
    /// visible under its final name, or the previous files stay untouched.
    pub fn build(&mut self) -> Result<(), PgError> {
        if self.prefix.is_none() {
            return Err(PgError::Inconsistent("build() on a buffered builder".into()));
        }
        self.seal()?;
        for sink in self.sinks.iter_mut().flatten() {
            sink.finish()?;
        }
        for sink in self.sinks.iter_mut().flatten() {
            sink.commit()?;
        }
        Ok(())
    }

    /// Seals a buffered bundle and writes it under `prefix` with the same
    /// temporary-then-promote protocol as the on-the-fly mode.
    pub fn build_to(&mut self, prefix: &str) -> Result<(), PgError> {
        if self.prefix.is_some() {
            return Err(PgError::Inconsistent("build_to() on an on-the-fly builder".into()));
        }
        self.seal()?;
        let mut written: Vec<&'static str> = Vec::new();
        for column in Column::ALL {
            let Some(sink) = self.sinks[column as usize].as_deref_mut() else { continue };
            let Some(data) = sink.take_buffer() else {
                return Err(PgError::Inconsistent(format!("column {column:?} is not buffered")));
            };
            let suffix = column.suffix(&self.opts);
            let temp = format!("{prefix}{suffix}{TEMPORARY_FILE_SUFFIX}");
            fs::write(&temp, data).map_err(|e| PgError::open(&temp, e))?;
            written.push(suffix);
        }
        for suffix in written {
            accept_temporary(prefix, suffix)?;
        }
        Ok(())
    }

    /// Seals a buffered bundle and stages every column through the
    /// compression driver: a presence byte per column in fixed order, then
    /// its framed block.  The mismatch-positions column goes through the
    /// stratified path, guided by the mismatch-count column.
    pub fn compressed_build<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        level: CoderLevel,
    ) -> Result<(), PgError> {
        if self.prefix.is_some() {
            return Err(PgError::Inconsistent("compressed_build() on an on-the-fly builder".into()));
        }
        self.seal()?;
        let spec = CoderSpec::store(level);
        let elem_width = self.mis_pos_width();
        for column in Column::ALL {
            let Some(sink) = self.sinks[column as usize].as_deref_mut() else {
                write_value::<u8, _>(out, 0u8, false)?;
                continue;
            };
            let Some(data) = sink.take_buffer() else {
                return Err(PgError::Inconsistent(format!("column {column:?} is not buffered")));
            };
            write_value::<u8, _>(out, 1u8, false)?;
            if column == Column::MisPos && !self.opts.plain_text {
                let spec = CoderSpec { param: column_period(elem_width), ..spec };
                write_mismatch_offsets_stratified(out, &data, &self.mis_counts, elem_width, spec)?;
            } else {
                let spec = CoderSpec { param: DATA_PERIOD_CODE_8, ..spec };
                write_compressed(out, &data, spec)?;
            }
        }
        Ok(())
    }
}

fn column_period(elem_width: usize) -> i32 {
    match elem_width {
        2 => DATA_PERIOD_CODE_16,
        4 => DATA_PERIOD_CODE_32,
        _ => DATA_PERIOD_CODE_8,
    }
}
