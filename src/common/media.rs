// SPDX-License-Identifier: GPL-2.0-or-later

use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaSetType {
    // On-demand, the total duration is known.
    Vod,

    // Live, durations are written as zero.
    Live,
}

/// Tracks and timing that make up one presentation.
#[derive(Clone, Debug)]
pub struct MediaSet {
    /// Track IDs are assigned in order, starting at 1.
    pub tracks: Vec<MediaTrack>,
    pub set_type: MediaSetType,

    /// Ignored for live sets.
    pub total_duration_ms: u64,

    /// Only selects the file type record.
    pub version: u32,
}

impl MediaSet {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.set_type == MediaSetType::Live
    }

    /// Timescale shared by every track, taken from the first one.
    #[must_use]
    pub fn timescale(&self) -> Option<u32> {
        self.tracks.first().map(|t| t.timescale)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoParams {
    pub codec: VideoCodec,
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioParams {
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,

    // 14496-1 objectTypeIndication, 0x40 for MPEG-4 audio.
    pub object_type_id: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaParams {
    Video(VideoParams),
    Audio(AudioParams),
}

/// One elementary stream.
#[derive(Clone, Debug)]
pub struct MediaTrack {
    pub params: MediaParams,
    pub timescale: u32,

    /// Codec configuration, embedded verbatim.
    pub extra_data: Bytes,
    pub bitrate: u32,

    /// Complete stsd box. Built from the other fields when absent or empty.
    pub sample_description: Option<Bytes>,
}
