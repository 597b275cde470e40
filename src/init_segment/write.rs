// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{
    atom_writer::write_atom,
    layout::{self, StsdSource, TrackVisitor},
    sizes::{SizeTree, TrackSizes},
    AtomWriter, BuildError,
};
use bytes::Bytes;
use common::MediaSet;
use mp4::{
    write_box_info, write_single_box, BoxType, ImmutableBox, SliceWriter, TYPE_MOOV, TYPE_MVEX,
    TYPE_STSD,
};
use std::io::Write;

fn check_span(box_type: BoxType, written: usize, computed: usize) -> Result<(), BuildError> {
    if written != computed {
        return Err(BuildError::ContainerLength {
            box_type,
            written,
            computed,
        });
    }
    Ok(())
}

// Writes a container header with the precomputed size, then its
// children, and checks that the children filled exactly that size.
fn write_container<F>(
    w: &mut SliceWriter,
    box_type: BoxType,
    size: usize,
    children: F,
) -> Result<(), BuildError>
where
    F: FnOnce(&mut SliceWriter) -> Result<(), BuildError>,
{
    let start = w.position();
    write_box_info(w, size, box_type)?;
    children(w)?;
    check_span(box_type, w.position() - start, size)
}

// Serializes the segment into `w` in the same order the sizes were
// computed. Returns the number of bytes written.
pub(crate) fn write_segment(
    w: &mut SliceWriter,
    set: &MediaSet,
    sizes: &SizeTree,
    stsds: &[Bytes],
    extra_moov_writer: Option<&dyn AtomWriter>,
    stsd_writer: Option<&dyn AtomWriter>,
) -> Result<usize, BuildError> {
    let timescale = sizes.timescale;
    let duration = sizes.duration;

    write_single_box(w, &layout::ftyp(set.version))?;

    write_container(w, TYPE_MOOV, sizes.moov, |w| {
        write_single_box(w, &layout::mvhd(timescale, duration))?;

        write_container(w, TYPE_MVEX, sizes.mvex, |w| {
            for index in 0..set.tracks.len() {
                write_single_box(w, &layout::trex(layout::track_id(index)?))?;
            }
            Ok(())
        })?;

        let tracks = set.tracks.iter().zip(stsds).zip(&sizes.tracks);
        for (index, ((track, stsd), track_sizes)) in tracks.enumerate() {
            let atoms =
                layout::track_atoms(track, index, timescale, duration, stsd, stsd_writer)?;
            atoms.visit(&mut TrackWriter {
                w: &mut *w,
                sizes: track_sizes,
            })?;
        }

        if let Some(extra) = extra_moov_writer {
            write_atom(w, extra, "extra moov")?;
        }
        Ok(())
    })?;

    Ok(w.position())
}

// Serializes a track with the container sizes of the size pass.
struct TrackWriter<'a, 'b> {
    w: &'a mut SliceWriter<'b>,
    sizes: &'a TrackSizes,
}

impl TrackVisitor for TrackWriter<'_, '_> {
    fn leaf(&mut self, b: &dyn ImmutableBox) -> Result<(), BuildError> {
        write_single_box(self.w, b)?;
        Ok(())
    }

    fn stsd(&mut self, stsd: StsdSource) -> Result<(), BuildError> {
        let start = self.w.position();
        match stsd {
            StsdSource::Writer(writer) => write_atom(self.w, writer, "stsd")?,
            StsdSource::Record(record) => {
                self.w.write_all(record).map_err(mp4::Mp4Error::from)?;
            }
        }
        check_span(TYPE_STSD, self.w.position() - start, self.sizes.stsd)
    }

    fn container<F>(&mut self, box_type: BoxType, children: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        let size = self.sizes.container(box_type);
        let start = self.w.position();
        write_box_info(self.w, size, box_type)?;
        children(self)?;
        check_span(box_type, self.w.position() - start, size)
    }
}
