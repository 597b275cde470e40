// SPDX-License-Identifier: GPL-2.0-or-later

use crate::BuildError;
use bytes::Bytes;
use mp4::{Mp4Error, SliceWriter};

/// Caller supplied serializer for a complete atom, header included.
///
/// The declared size is queried during sizing and must match
/// the number of bytes produced by `write` exactly.
pub trait AtomWriter {
    fn atom_size(&self) -> usize;
    fn write(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error>;
}

/// Pre-serialized atom written verbatim.
#[derive(Clone, Debug)]
pub struct RawAtom(pub Bytes);

impl AtomWriter for RawAtom {
    fn atom_size(&self) -> usize {
        self.0.len()
    }

    fn write(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
        w.write_all(&self.0)?;
        Ok(())
    }
}

// Runs a writer and checks that it produced exactly what it declared.
pub(crate) fn write_atom(
    w: &mut SliceWriter,
    writer: &dyn AtomWriter,
    name: &'static str,
) -> Result<(), BuildError> {
    let declared = writer.atom_size();
    let start = w.position();

    writer.write(w).map_err(|e| {
        if e.is_overflow() {
            BuildError::AtomWriterLength {
                name,
                written: w.position() - start,
                declared,
            }
        } else {
            BuildError::Mp4(e)
        }
    })?;

    let written = w.position() - start;
    if written != declared {
        return Err(BuildError::AtomWriterLength {
            name,
            written,
            declared,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    struct LyingAtom {
        declared: usize,
        actual: usize,
    }

    impl AtomWriter for LyingAtom {
        fn atom_size(&self) -> usize {
            self.declared
        }

        fn write(&self, w: &mut dyn std::io::Write) -> Result<(), Mp4Error> {
            w.write_all(&vec![0xaa; self.actual])?;
            Ok(())
        }
    }

    #[test]
    fn test_write_atom_raw() {
        let mut buf = [0; 6];
        let mut w = SliceWriter::new(&mut buf);
        let atom = RawAtom(Bytes::from_static(&[1, 2, 3, 4]));

        write_atom(&mut w, &atom, "test").unwrap();
        assert_eq!(4, w.position());
        assert_eq!([1, 2, 3, 4, 0, 0], buf);
    }

    #[test]
    fn test_write_atom_short() {
        let mut buf = [0; 16];
        let mut w = SliceWriter::new(&mut buf);
        let atom = LyingAtom {
            declared: 8,
            actual: 4,
        };

        let err = write_atom(&mut w, &atom, "test").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
        assert!(matches!(
            err,
            BuildError::AtomWriterLength {
                written: 4,
                declared: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_write_atom_overflow() {
        let mut buf = [0; 8];
        let mut w = SliceWriter::new(&mut buf);
        let atom = LyingAtom {
            declared: 8,
            actual: 12,
        };

        let err = write_atom(&mut w, &atom, "test").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }
}
