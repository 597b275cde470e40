// SPDX-License-Identifier: GPL-2.0-or-later

// Records of the init segment in output order. Both the size and the
// write pass build them through the functions below, so every leaf
// size comes from the same value that is later marshaled.

use crate::{AtomWriter, BuildError};
use bytes::Bytes;
use common::{time::rescale_millis, MediaParams, MediaSet, MediaTrack};
use mp4::{
    empty_sample_tables, u32_to_flags, BoxType, Dinf, EmptyTable, Ftyp, Hdlr, ImmutableBox,
    MediaDuration, Mdhd, Mp4Error, Mvhd, Smhd, Tkhd, Trex, Vmhd, TYPE_MDIA, TYPE_MINF, TYPE_STBL,
    TYPE_TRAK, UNITY_MATRIX,
};

pub(crate) fn ftyp(version: u32) -> Ftyp {
    if version < 2 {
        Ftyp::v1()
    } else {
        Ftyp::v2()
    }
}

// Movie duration in the shared timescale. Live sets have no duration.
pub(crate) fn movie_duration(set: &MediaSet, timescale: u32) -> Result<MediaDuration, BuildError> {
    if set.is_live() {
        return Ok(MediaDuration::Narrow(0));
    }
    let duration =
        rescale_millis(set.total_duration_ms, timescale).ok_or(BuildError::Duration {
            millis: set.total_duration_ms,
            timescale,
        })?;
    Ok(MediaDuration::new(duration))
}

pub(crate) fn mvhd(timescale: u32, duration: MediaDuration) -> Mvhd {
    Mvhd::new(timescale, duration)
}

pub(crate) fn track_id(index: usize) -> Result<u32, BuildError> {
    let id = index + 1;
    Ok(u32::try_from(id).map_err(|e| Mp4Error::FromInt("track id".to_owned(), e))?)
}

pub(crate) fn trex(track_id: u32) -> Trex {
    Trex {
        track_id,
        default_sample_description_index: 1,
        ..Trex::default()
    }
}

// Video or sound media header.
pub(crate) enum MediaHeader {
    Video(Vmhd),
    Sound(Smhd),
}

impl ImmutableBox for MediaHeader {
    fn box_type(&self) -> BoxType {
        match self {
            MediaHeader::Video(b) => b.box_type(),
            MediaHeader::Sound(b) => b.box_type(),
        }
    }

    fn size(&self) -> usize {
        match self {
            MediaHeader::Video(b) => b.size(),
            MediaHeader::Sound(b) => b.size(),
        }
    }

    fn marshal(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        match self {
            MediaHeader::Video(b) => b.marshal(w),
            MediaHeader::Sound(b) => b.marshal(w),
        }
    }
}

// Where the sample description of a track comes from.
#[derive(Clone, Copy)]
pub(crate) enum StsdSource<'a> {
    Writer(&'a dyn AtomWriter),
    Record(&'a Bytes),
}

impl StsdSource<'_> {
    // Complete atom size, header included.
    pub(crate) fn size(&self) -> usize {
        match self {
            StsdSource::Writer(w) => w.atom_size(),
            StsdSource::Record(b) => b.len(),
        }
    }
}

pub(crate) struct TrackAtoms<'a> {
    pub tkhd: Tkhd,
    pub mdhd: Mdhd,
    pub hdlr: Hdlr,
    pub media_header: MediaHeader,
    pub dinf: Dinf,
    pub stsd: StsdSource<'a>,
    pub sample_tables: [EmptyTable; 4],
}

impl<'a> TrackAtoms<'a> {
    pub(crate) fn new(
        track: &MediaTrack,
        track_id: u32,
        timescale: u32,
        duration: MediaDuration,
        stsd: StsdSource<'a>,
    ) -> Self {
        let flags = u32_to_flags(mp4::TKHD_TRACK_ENABLED | mp4::TKHD_TRACK_IN_MOVIE);

        let (tkhd, hdlr, media_header) = match track.params {
            MediaParams::Video(params) => (
                Tkhd {
                    flags,
                    track_id,
                    duration,
                    volume: 0,
                    matrix: UNITY_MATRIX,
                    width: u32::from(params.width) << 16,
                    height: u32::from(params.height) << 16,
                },
                Hdlr::video(),
                MediaHeader::Video(Vmhd::default()),
            ),
            MediaParams::Audio(_) => (
                Tkhd {
                    flags,
                    track_id,
                    duration,
                    volume: 0x0100,
                    matrix: UNITY_MATRIX,
                    width: 0,
                    height: 0,
                },
                Hdlr::sound(),
                MediaHeader::Sound(Smhd::default()),
            ),
        };

        Self {
            tkhd,
            mdhd: Mdhd {
                timescale,
                duration,
                language: 0,
            },
            hdlr,
            media_header,
            dinf: Dinf,
            stsd,
            sample_tables: empty_sample_tables(),
        }
    }
}

// Receives the atoms of a track in output order.
pub(crate) trait TrackVisitor {
    fn leaf(&mut self, b: &dyn ImmutableBox) -> Result<(), BuildError>;

    fn stsd(&mut self, stsd: StsdSource) -> Result<(), BuildError>;

    fn container<F>(&mut self, box_type: BoxType, children: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Self) -> Result<(), BuildError>;
}

impl TrackAtoms<'_> {
    // Walks trak, mdia, minf and stbl with their children.
    pub(crate) fn visit<V: TrackVisitor>(&self, v: &mut V) -> Result<(), BuildError> {
        v.container(TYPE_TRAK, |v| {
            v.leaf(&self.tkhd)?;
            v.container(TYPE_MDIA, |v| {
                v.leaf(&self.mdhd)?;
                v.leaf(&self.hdlr)?;
                v.container(TYPE_MINF, |v| {
                    v.leaf(&self.media_header)?;
                    v.leaf(&self.dinf)?;
                    v.container(TYPE_STBL, |v| {
                        v.stsd(self.stsd)?;
                        for table in &self.sample_tables {
                            v.leaf(table)?;
                        }
                        Ok(())
                    })
                })
            })
        })
    }
}

// Atoms of the track at `index`. The stsd writer, when
// present, replaces the record of every track.
pub(crate) fn track_atoms<'a>(
    track: &MediaTrack,
    index: usize,
    timescale: u32,
    duration: MediaDuration,
    stsd_record: &'a Bytes,
    stsd_writer: Option<&'a dyn AtomWriter>,
) -> Result<TrackAtoms<'a>, BuildError> {
    let stsd = match stsd_writer {
        Some(w) => StsdSource::Writer(w),
        None => StsdSource::Record(stsd_record),
    };
    Ok(TrackAtoms::new(
        track,
        track_id(index)?,
        timescale,
        duration,
        stsd,
    ))
}

// Size of a leaf record including its header.
pub(crate) fn box_size(b: &dyn ImmutableBox) -> usize {
    mp4::BOX_HEADER_SIZE + b.size()
}
