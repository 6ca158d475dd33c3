//! BlockReader: reads the fields of a compressed block.
//!
//! Mirrors [`super::writer::BlockWriter`]: nibbles come in pairs, the high half of a byte
//! first. Every read is bounds checked; running off the end of the block is a format error,
//! never a panic.

use crate::error::{format_error, Result};

const EOF_MESSAGE: &str = "unexpected end of compressed block";

#[derive(Debug)]
pub struct BlockReader<'a> {
    input: &'a [u8],
    cursor: usize,
    /// Low nibble of the last nibble byte, waiting to be read.
    pending_nibble: Option<u8>,
}

impl<'a> BlockReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            cursor: 0,
            pending_nibble: None,
        }
    }

    /// Returns the next byte.
    pub fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.cursor)
            .ok_or_else(|| format_error(EOF_MESSAGE))?;
        self.cursor += 1;
        Ok(byte)
    }

    /// Returns the next `n` bytes as a slice of the input.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(n)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| format_error(EOF_MESSAGE))?;
        let slice = &self.input[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Returns the next nibble.
    pub fn nibble(&mut self) -> Result<u8> {
        match self.pending_nibble.take() {
            Some(low) => Ok(low),
            None => {
                let byte = self.byte()?;
                self.pending_nibble = Some(byte & 0x0f);
                Ok(byte >> 4)
            }
        }
    }

    /// True when every byte of the block has been consumed.
    pub fn is_empty(&self) -> bool {
        self.cursor == self.input.len()
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Debugging function. Report current position in the block.
    pub fn loc(&self) -> String {
        format!(
            "[{}{}]",
            self.cursor,
            if self.pending_nibble.is_some() { ".4" } else { "" }
        )
    }
}
