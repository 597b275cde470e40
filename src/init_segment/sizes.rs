// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{
    allocator::try_with_capacity,
    layout::{self, box_size, StsdSource, TrackAtoms, TrackVisitor},
    AtomWriter, BuildError,
};
use bytes::Bytes;
use common::MediaSet;
use mp4::{
    BoxType, ImmutableBox, MediaDuration, BOX_HEADER_SIZE, TYPE_MDIA, TYPE_MINF, TYPE_STBL,
    TYPE_TRAK,
};

/// Sizes of the container atoms of one track, headers included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TrackSizes {
    pub stsd: usize,
    pub stbl: usize,
    pub minf: usize,
    pub mdia: usize,
    pub trak: usize,
}

/// Result of the size pass. The write pass reads container
/// sizes from here instead of recomputing them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SizeTree {
    pub timescale: u32,
    pub duration: MediaDuration,
    pub tracks: Vec<TrackSizes>,
    pub mvex: usize,
    pub moov: usize,
    pub total: usize,
}

impl TrackSizes {
    // Size of a track container. Unknown types are zero
    // and fail the span check of the write pass.
    pub(crate) fn container(&self, box_type: BoxType) -> usize {
        match box_type {
            TYPE_TRAK => self.trak,
            TYPE_MDIA => self.mdia,
            TYPE_MINF => self.minf,
            TYPE_STBL => self.stbl,
            _ => 0,
        }
    }

    fn set_container(&mut self, box_type: BoxType, size: usize) {
        match box_type {
            TYPE_TRAK => self.trak = size,
            TYPE_MDIA => self.mdia = size,
            TYPE_MINF => self.minf = size,
            TYPE_STBL => self.stbl = size,
            _ => {}
        }
    }
}

// Sums leaf sizes up through the containers.
#[derive(Default)]
struct SizeVisitor {
    pos: usize,
    sizes: TrackSizes,
}

impl TrackVisitor for SizeVisitor {
    fn leaf(&mut self, b: &dyn ImmutableBox) -> Result<(), BuildError> {
        self.pos += box_size(b);
        Ok(())
    }

    fn stsd(&mut self, stsd: StsdSource) -> Result<(), BuildError> {
        self.sizes.stsd = stsd.size();
        self.pos += self.sizes.stsd;
        Ok(())
    }

    fn container<F>(&mut self, box_type: BoxType, children: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        let start = self.pos;
        self.pos += BOX_HEADER_SIZE;
        children(self)?;
        self.sizes.set_container(box_type, self.pos - start);
        Ok(())
    }
}

impl TrackAtoms<'_> {
    pub(crate) fn sizes(&self) -> Result<TrackSizes, BuildError> {
        let mut v = SizeVisitor::default();
        self.visit(&mut v)?;
        Ok(v.sizes)
    }
}

// Computes the size of every container and of the whole segment.
// `stsds` holds one sample description per track.
pub(crate) fn calc_sizes(
    set: &MediaSet,
    stsds: &[Bytes],
    extra_moov_writer: Option<&dyn AtomWriter>,
    stsd_writer: Option<&dyn AtomWriter>,
) -> Result<SizeTree, BuildError> {
    let timescale = set.timescale().ok_or(BuildError::NoTracks)?;
    let duration = layout::movie_duration(set, timescale)?;

    let mut tracks = try_with_capacity(set.tracks.len())?;

    let mut mvex = BOX_HEADER_SIZE;
    let mut moov = BOX_HEADER_SIZE + box_size(&layout::mvhd(timescale, duration));

    for (index, (track, stsd)) in set.tracks.iter().zip(stsds).enumerate() {
        let track_id = layout::track_id(index)?;
        mvex += box_size(&layout::trex(track_id));

        let atoms = layout::track_atoms(track, index, timescale, duration, stsd, stsd_writer)?;
        let sizes = atoms.sizes()?;
        moov += sizes.trak;
        tracks.push(sizes);
    }
    moov += mvex;

    if let Some(w) = extra_moov_writer {
        moov += w.atom_size();
    }

    let total = box_size(&layout::ftyp(set.version)) + moov;

    Ok(SizeTree {
        timescale,
        duration,
        tracks,
        mvex,
        moov,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{build_stsd, HeapAllocator, RawAtom};
    use common::{AudioParams, MediaParams, MediaSetType, MediaTrack, VideoCodec, VideoParams};
    use pretty_assertions::assert_eq;

    fn video_track(extra_data_len: usize) -> MediaTrack {
        MediaTrack {
            params: MediaParams::Video(VideoParams {
                codec: VideoCodec::H264,
                width: 650,
                height: 450,
            }),
            timescale: 90000,
            extra_data: vec![0; extra_data_len].into(),
            bitrate: 0,
            sample_description: None,
        }
    }

    fn audio_track(extra_data_len: usize) -> MediaTrack {
        MediaTrack {
            params: MediaParams::Audio(AudioParams {
                channels: 2,
                bits_per_sample: 16,
                sample_rate: 48000,
                object_type_id: 0x40,
            }),
            timescale: 90000,
            extra_data: vec![0; extra_data_len].into(),
            bitrate: 128_000,
            sample_description: None,
        }
    }

    fn stsds(set: &MediaSet) -> Vec<Bytes> {
        set.tracks
            .iter()
            .map(|t| build_stsd(&HeapAllocator, t, 1).unwrap())
            .collect()
    }

    #[test]
    fn test_calc_sizes_video() {
        let set = MediaSet {
            tracks: vec![video_track(38)],
            set_type: MediaSetType::Vod,
            total_duration_ms: 10_000,
            version: 1,
        };
        let got = calc_sizes(&set, &stsds(&set), None, None).unwrap();

        let want = SizeTree {
            timescale: 90000,
            duration: MediaDuration::Narrow(900_000),
            tracks: vec![TrackSizes {
                stsd: 148,
                stbl: 224,
                minf: 288,
                mdia: 373,
                trak: 473,
            }],
            mvex: 40,
            moov: 629,
            total: 653,
        };
        assert_eq!(want, got);
    }

    #[test]
    fn test_calc_sizes_audio_wide() {
        let set = MediaSet {
            tracks: vec![audio_track(2)],
            set_type: MediaSetType::Vod,
            total_duration_ms: 100_000_000,
            version: 2,
        };
        let got = calc_sizes(&set, &stsds(&set), None, None).unwrap();

        // stsd 91, stbl 8 + 91 + 68, minf 8 + 16 + 36 + stbl,
        // mdia 8 + 44 + 45 + minf, trak 8 + 104 + mdia.
        let want = TrackSizes {
            stsd: 91,
            stbl: 167,
            minf: 227,
            mdia: 324,
            trak: 436,
        };
        assert_eq!(MediaDuration::Wide(9_000_000_000), got.duration);
        assert_eq!(vec![want], got.tracks);
        assert_eq!(8 + 120 + 40 + 436, got.moov);
        assert_eq!(28 + got.moov, got.total);
    }

    #[test]
    fn test_calc_sizes_live_with_writers() {
        let set = MediaSet {
            tracks: vec![video_track(10), audio_track(5)],
            set_type: MediaSetType::Live,
            total_duration_ms: u64::MAX,
            version: 1,
        };
        let extra = RawAtom(vec![0; 17].into());
        let stsd = RawAtom(vec![0; 30].into());

        let got = calc_sizes(&set, &stsds(&set), Some(&extra), Some(&stsd)).unwrap();

        assert_eq!(MediaDuration::Narrow(0), got.duration);
        assert_eq!(8 + 2 * 32, got.mvex);
        for sizes in &got.tracks {
            assert_eq!(30, sizes.stsd);
        }
        let traks: usize = got.tracks.iter().map(|t| t.trak).sum();
        assert_eq!(8 + 108 + got.mvex + traks + 17, got.moov);
    }

    #[test]
    fn test_track_sizes_container() {
        let sizes = TrackSizes {
            stsd: 1,
            stbl: 2,
            minf: 3,
            mdia: 4,
            trak: 5,
        };
        assert_eq!(2, sizes.container(TYPE_STBL));
        assert_eq!(3, sizes.container(TYPE_MINF));
        assert_eq!(4, sizes.container(TYPE_MDIA));
        assert_eq!(5, sizes.container(TYPE_TRAK));
        assert_eq!(0, sizes.container(*b"udta"));
    }

    #[test]
    fn test_calc_sizes_no_tracks() {
        let set = MediaSet {
            tracks: Vec::new(),
            set_type: MediaSetType::Vod,
            total_duration_ms: 0,
            version: 1,
        };
        assert!(matches!(
            calc_sizes(&set, &[], None, None),
            Err(BuildError::NoTracks)
        ));
    }
}
