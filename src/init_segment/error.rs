// SPDX-License-Identifier: GPL-2.0-or-later

use mp4::{BoxType, Mp4Error};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("allocate {0} bytes")]
pub struct AllocError(pub usize);

/// Classification of a failed build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A buffer could not be obtained.
    Alloc,

    /// Computed and written sizes disagree, or an external
    /// writer did not honor its declared size.
    Internal,

    /// A value does not fit its serialized field.
    Range,

    /// The media set cannot describe a presentation.
    Input,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}")]
    Alloc(#[from] AllocError),

    #[error("media set has no tracks")]
    NoTracks,

    #[error("track {track_id}: decoder config of {len} bytes exceeds maximum of {max}")]
    DecoderConfigTooLarge {
        track_id: usize,
        len: usize,
        max: usize,
    },

    #[error("duration {millis}ms at timescale {timescale} overflows")]
    Duration { millis: u64, timescale: u32 },

    #[error("track {track_id}: stsd length {written} different than allocated length {allocated}")]
    StsdLength {
        track_id: usize,
        written: usize,
        allocated: usize,
    },

    #[error("{name} atom writer wrote {written} bytes but declared {declared}")]
    AtomWriterLength {
        name: &'static str,
        written: usize,
        declared: usize,
    },

    #[error("{} length {written} different than computed length {computed}", String::from_utf8_lossy(.box_type))]
    ContainerLength {
        box_type: BoxType,
        written: usize,
        computed: usize,
    },

    #[error("result length {written} different than allocated length {allocated}")]
    LengthMismatch { written: usize, allocated: usize },

    #[error("mp4: {0}")]
    Mp4(#[from] Mp4Error),
}

impl BuildError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        use BuildError::*;
        match self {
            Alloc(_) => ErrorKind::Alloc,
            NoTracks => ErrorKind::Input,
            DecoderConfigTooLarge { .. } | Duration { .. } => ErrorKind::Range,
            StsdLength { .. }
            | AtomWriterLength { .. }
            | ContainerLength { .. }
            | LengthMismatch { .. } => ErrorKind::Internal,
            Mp4(e) => match e {
                Mp4Error::DescriptorLength(_) | Mp4Error::FromInt(..) => ErrorKind::Range,
                Mp4Error::Write(_) => ErrorKind::Internal,
            },
        }
    }
}
