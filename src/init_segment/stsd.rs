// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{Allocator, BuildError};
use bytes::Bytes;
use common::{AudioParams, MediaParams, MediaTrack, VideoCodec, VideoParams};
use mp4::{
    AudioSampleEntry, Boxes, CodecConfig, Esds, SampleEntry, SliceWriter, Stsd,
    VisualSampleEntry, AUDIO_SAMPLE_ENTRY_SIZE, BOX_HEADER_SIZE, ESDS_MAX_DECODER_SPECIFIC_INFO,
    TYPE_AVC1, TYPE_AVCC, TYPE_HVC1, TYPE_HVCC, TYPE_MP4A, VISUAL_SAMPLE_ENTRY_SIZE,
};

// Version, flags and entry count.
const STSD_FIELDS_SIZE: usize = 8;

/// Size of the sample description built for `track`, header included.
#[must_use]
pub fn stsd_size(track: &MediaTrack) -> usize {
    let n = track.extra_data.len();
    let entry = match track.params {
        MediaParams::Video(_) => {
            BOX_HEADER_SIZE + VISUAL_SAMPLE_ENTRY_SIZE + BOX_HEADER_SIZE + n
        }
        MediaParams::Audio(_) => {
            BOX_HEADER_SIZE + AUDIO_SAMPLE_ENTRY_SIZE + BOX_HEADER_SIZE + Esds::size_for(n)
        }
    };
    BOX_HEADER_SIZE + STSD_FIELDS_SIZE + entry
}

/// Serializes a single entry sample description for `track` into
/// a buffer from `allocator`. `track_id` is only used in errors.
pub fn build_stsd(
    allocator: &dyn Allocator,
    track: &MediaTrack,
    track_id: usize,
) -> Result<Bytes, BuildError> {
    let entry = match track.params {
        MediaParams::Video(params) => video_entry(track, params),
        MediaParams::Audio(params) => audio_entry(track, params, track_id)?,
    };
    let tree = Boxes::new(Stsd { entry_count: 1 }).with_child(entry);

    let allocated = stsd_size(track);
    let mut buf = allocator.alloc(allocated)?;
    buf.truncate(allocated);
    let mut w = SliceWriter::new(&mut buf);

    match tree.marshal(&mut w) {
        Ok(()) => {}
        Err(e) if e.is_overflow() => {
            return Err(BuildError::StsdLength {
                track_id,
                written: w.position(),
                allocated,
            })
        }
        Err(e) => return Err(e.into()),
    }

    let written = w.position();
    if written != allocated {
        return Err(BuildError::StsdLength {
            track_id,
            written,
            allocated,
        });
    }
    Ok(Bytes::from(buf))
}

fn video_entry(track: &MediaTrack, params: VideoParams) -> Boxes {
    let (entry_type, config_type) = match params.codec {
        VideoCodec::H264 => (TYPE_AVC1, TYPE_AVCC),
        VideoCodec::H265 => (TYPE_HVC1, TYPE_HVCC),
    };
    Boxes::new(VisualSampleEntry::new(
        entry_type,
        params.width,
        params.height,
    ))
    .with_child(Boxes::new(CodecConfig {
        box_type: config_type,
        data: track.extra_data.clone(),
    }))
}

fn audio_entry(
    track: &MediaTrack,
    params: AudioParams,
    track_id: usize,
) -> Result<Boxes, BuildError> {
    let esds = Esds {
        es_id: 1,
        object_type_id: params.object_type_id,
        buffer_size_db: 0,
        max_bitrate: track.bitrate,
        avg_bitrate: track.bitrate,
        decoder_specific_info: track.extra_data.clone(),
    };
    if esds.validate().is_err() {
        return Err(BuildError::DecoderConfigTooLarge {
            track_id,
            len: track.extra_data.len(),
            max: ESDS_MAX_DECODER_SPECIFIC_INFO,
        });
    }

    Ok(Boxes::new(AudioSampleEntry {
        box_type: TYPE_MP4A,
        sample_entry: SampleEntry::default(),
        channel_count: params.channels,
        sample_size: params.bits_per_sample,
        sample_rate: sample_rate_field(params.sample_rate),
    })
    .with_child(Boxes::new(esds)))
}

// Integer part of the 16.16 sample rate. Rates that do not fit are
// written as zero, the decoder specific info carries the real rate.
fn sample_rate_field(sample_rate: u32) -> u16 {
    u16::try_from(sample_rate).unwrap_or(0)
}
