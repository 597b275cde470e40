// SPDX-License-Identifier: GPL-2.0-or-later

use std::io::{Error, ErrorKind, Write};

// Bounds-checked cursor over a pre-allocated buffer.
//
// Every write either fits completely and advances the cursor,
// or fails with `ErrorKind::WriteZero` and leaves the cursor untouched.
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceWriter<'a> {
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    // Number of bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl Write for SliceWriter<'_> {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        if data.len() > self.remaining() {
            return Err(Error::new(
                ErrorKind::WriteZero,
                format!(
                    "buffer overflow: need {} bytes, {} remaining",
                    data.len(),
                    self.remaining()
                ),
            ));
        }
        let end = self.pos + data.len();
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
