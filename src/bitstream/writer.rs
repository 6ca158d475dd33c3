//! BlockWriter: writes the fields of a compressed block into a caller supplied buffer.
//!
//! Version 1 blocks only use whole bytes. Version 2 blocks also use nibbles, which are paired
//! into bytes: the first nibble reserves a byte at the current position and fills its high
//! half, the next nibble (wherever it comes in the stream) fills the low half.
//!
//! Every write is checked against the buffer capacity. Running out of room is reported as
//! [`Error::OutputTooSmall`] so the caller can store the block another way.

use crate::error::{Error, Result};

pub struct BlockWriter<'a> {
    /// Output buffer. Its length is the capacity.
    output: &'a mut [u8],
    /// Next free byte in the output.
    cursor: usize,
    /// Index of the byte whose low nibble is still free.
    pending_nibble: Option<usize>,
}

impl<'a> BlockWriter<'a> {
    /// Create a writer that fills `output` from its start.
    pub fn new(output: &'a mut [u8]) -> Self {
        Self {
            output,
            cursor: 0,
            pending_nibble: None,
        }
    }

    fn overflow(&self) -> Error {
        Error::OutputTooSmall {
            capacity: self.output.len(),
        }
    }

    /// Put one byte on the stream.
    pub fn byte(&mut self, value: u8) -> Result<()> {
        if self.cursor >= self.output.len() {
            return Err(self.overflow());
        }
        self.output[self.cursor] = value;
        self.cursor += 1;
        Ok(())
    }

    /// Copy a run of bytes (literals) onto the stream.
    pub fn bytes(&mut self, data: &[u8]) -> Result<()> {
        let end = self.cursor + data.len();
        if end > self.output.len() {
            return Err(self.overflow());
        }
        self.output[self.cursor..end].copy_from_slice(data);
        self.cursor = end;
        Ok(())
    }

    /// Put a 16 bit little-endian value on the stream.
    pub fn u16_le(&mut self, value: u16) -> Result<()> {
        self.bytes(&value.to_le_bytes())
    }

    /// Put a 16 bit big-endian value on the stream.
    pub fn u16_be(&mut self, value: u16) -> Result<()> {
        self.bytes(&value.to_be_bytes())
    }

    /// Put a 4 bit value on the stream, sharing a byte with the previous or next nibble.
    pub fn nibble(&mut self, value: u8) -> Result<()> {
        let value = value & 0x0f;
        match self.pending_nibble.take() {
            Some(idx) => {
                self.output[idx] |= value;
            }
            None => {
                let idx = self.cursor;
                self.byte(value << 4)?;
                self.pending_nibble = Some(idx);
            }
        }
        Ok(())
    }

    /// Number of bytes used so far (a half filled nibble byte counts as used).
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Debugging function. Report current position in the buffer.
    pub fn loc(&self) -> String {
        format!(
            "[{}{}]",
            self.cursor,
            if self.pending_nibble.is_some() { ".4" } else { "" }
        )
    }
}

#[cfg(test)]
mod test {
    use super::BlockWriter;
    use crate::error::Error;

    #[test]
    fn bytes_and_words() {
        let mut buf = [0_u8; 8];
        let mut bw = BlockWriter::new(&mut buf);
        bw.byte(0x12).unwrap();
        bw.u16_le(0x3456).unwrap();
        bw.u16_be(0x789a).unwrap();
        bw.bytes(b"hi").unwrap();
        assert_eq!(bw.len(), 7);
        assert_eq!(&buf[..7], &[0x12, 0x56, 0x34, 0x78, 0x9a, b'h', b'i']);
    }

    #[test]
    fn nibbles_share_a_byte() {
        let mut buf = [0_u8; 4];
        let mut bw = BlockWriter::new(&mut buf);
        bw.nibble(0xa).unwrap();
        bw.byte(0x55).unwrap();
        bw.nibble(0x3).unwrap();
        bw.nibble(0xf).unwrap();
        assert_eq!(bw.loc(), "[3.4]");
        assert_eq!(&buf[..3], &[0xa3, 0x55, 0xf0]);
    }

    #[test]
    fn overflow_is_reported() {
        let mut buf = [0_u8; 2];
        let mut bw = BlockWriter::new(&mut buf);
        bw.byte(1).unwrap();
        assert!(matches!(
            bw.bytes(b"ab"),
            Err(Error::OutputTooSmall { capacity: 2 })
        ));
        bw.nibble(1).unwrap();
        assert!(matches!(bw.nibble(2), Ok(())));
        assert!(bw.nibble(3).is_err());
    }
}
