// SPDX-License-Identifier: GPL-2.0-or-later

//! Fragmented MP4 initialization segment builder.
//!
//! The segment is built in two passes. The first computes the size of
//! every container, the second serializes into a buffer of exactly the
//! computed total. Any disagreement between the passes is an error.

mod allocator;
mod atom_writer;
mod error;
mod layout;
mod sizes;
mod stsd;
mod write;

#[cfg(test)]
mod test;

pub use allocator::{Allocator, HeapAllocator};
pub use atom_writer::{AtomWriter, RawAtom};
pub use error::{AllocError, BuildError, ErrorKind};
pub use stsd::{build_stsd, stsd_size};

use allocator::try_with_capacity;
use bytes::Bytes;
use common::{ArcMsgLogger, LogLevel, MediaSet};
use mp4::SliceWriter;
use sizes::calc_sizes;
use write::write_segment;

/// Caller supplied atom writers.
#[derive(Clone, Copy, Default)]
pub struct AtomWriters<'a> {
    /// Appended to moov after the last track.
    pub extra_moov: Option<&'a dyn AtomWriter>,

    /// Replaces the sample description of every track.
    pub stsd: Option<&'a dyn AtomWriter>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitSegment {
    /// Total size of a size-only build.
    Size(usize),

    /// Serialized segment.
    Data(Bytes),
}

impl InitSegment {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            InitSegment::Size(n) => *n,
            InitSegment::Data(data) => data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            InitSegment::Size(_) => None,
            InitSegment::Data(data) => Some(data),
        }
    }
}

/// Builds the initialization segment of `set`.
///
/// With `size_only` the total size is returned without allocating
/// or writing the segment. The media set is never modified.
pub fn build_init_segment(
    logger: &ArcMsgLogger,
    allocator: &dyn Allocator,
    set: &MediaSet,
    writers: AtomWriters,
    size_only: bool,
) -> Result<InitSegment, BuildError> {
    let result = build(logger, allocator, set, writers, size_only);
    if let Err(e) = &result {
        match e.kind() {
            ErrorKind::Alloc => logger.log(LogLevel::Debug, &format!("init segment: {e}")),
            ErrorKind::Internal | ErrorKind::Range | ErrorKind::Input => {
                logger.log(LogLevel::Error, &format!("init segment: {e}"));
            }
        }
    }
    result
}

fn build(
    logger: &ArcMsgLogger,
    allocator: &dyn Allocator,
    set: &MediaSet,
    writers: AtomWriters,
    size_only: bool,
) -> Result<InitSegment, BuildError> {
    if set.tracks.is_empty() {
        return Err(BuildError::NoTracks);
    }

    let mut stsds = try_with_capacity(set.tracks.len())?;
    for (index, track) in set.tracks.iter().enumerate() {
        // An empty record counts as absent.
        let stsd = match &track.sample_description {
            Some(stsd) if !stsd.is_empty() => stsd.clone(),
            _ => build_stsd(allocator, track, index + 1)?,
        };
        stsds.push(stsd);
    }

    let sizes = calc_sizes(set, &stsds, writers.extra_moov, writers.stsd)?;

    if size_only {
        logger.log(
            LogLevel::Debug,
            &format!("init segment: size only, {} bytes", sizes.total),
        );
        return Ok(InitSegment::Size(sizes.total));
    }

    let allocated = sizes.total;
    let mut buf = allocator.alloc(allocated)?;
    buf.truncate(allocated);
    let mut w = SliceWriter::new(&mut buf);

    let written = write_segment(
        &mut w,
        set,
        &sizes,
        &stsds,
        writers.extra_moov,
        writers.stsd,
    )?;
    if written != allocated {
        return Err(BuildError::LengthMismatch { written, allocated });
    }

    Ok(InitSegment::Data(Bytes::from(buf)))
}
