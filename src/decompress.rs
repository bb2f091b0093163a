// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

//! LZS decoder.
//!
//! The stream is a run of groups: one flag byte, then up to eight tokens read
//! low bit first. A set bit is a literal byte, a clear bit is a two byte
//! reference `(offset: 12 bits, length - 3: 4 bits)` into a 4096 byte ring.
//! There is no end marker; decoding stops when the input runs out.

use std::iter::FusedIterator;

/// Size of the ring buffer used as the dictionary.
pub const WINDOW_SIZE: usize = 4096;

/// Longest match a reference can encode.
pub const MAX_MATCH: usize = 18;

/// Matches this long or shorter are stored as literals.
pub const THRESHOLD: usize = 2;

pub(crate) const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Where the first decoded byte lands in the ring.
pub(crate) const WINDOW_START: usize = WINDOW_SIZE - MAX_MATCH;

/// Streams decoded bytes out of an LZS buffer.
///
/// Reads of ring slots that were never written yield zero, matching the
/// original tool. A truncated stream ends early rather than failing.
pub struct Decoder<'a> {
    input: &'a [u8],
    input_cursor: usize,
    window: Box<[u8; WINDOW_SIZE + MAX_MATCH - 1]>,
    window_cursor: usize,
    flags: u32,
    copy_source: usize,
    copy_remaining: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Decoder {
            input,
            input_cursor: 0,
            window: Box::new([0; WINDOW_SIZE + MAX_MATCH - 1]),
            window_cursor: WINDOW_START,
            flags: 0,
            copy_source: 0,
            copy_remaining: 0,
        }
    }

    fn push(&mut self, byte: u8) -> u8 {
        self.window[self.window_cursor] = byte;
        self.window_cursor = (self.window_cursor + 1) & WINDOW_MASK;
        byte
    }

    fn next_input(&mut self) -> Option<u8> {
        let byte = self.input.get(self.input_cursor).copied();
        if byte.is_some() {
            self.input_cursor += 1;
        }
        byte
    }

    fn finish(&mut self) -> Option<u8> {
        self.input_cursor = self.input.len();
        self.copy_remaining = 0;
        None
    }
}

impl Iterator for Decoder<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.copy_remaining > 0 {
            let byte = self.window[self.copy_source & WINDOW_MASK];
            self.copy_source += 1;
            self.copy_remaining -= 1;
            return Some(self.push(byte));
        }

        // The high byte counts down the eight tokens of the current group.
        self.flags >>= 1;
        if self.flags & 0x100 == 0 {
            match self.next_input() {
                Some(flag) => self.flags = u32::from(flag) | 0xff00,
                None => return self.finish(),
            }
        }

        if self.flags & 1 == 1 {
            return match self.next_input() {
                Some(byte) => Some(self.push(byte)),
                None => self.finish(),
            };
        }

        if self.input_cursor + 1 >= self.input.len() {
            return self.finish();
        }
        let i = usize::from(self.input[self.input_cursor]);
        let j = usize::from(self.input[self.input_cursor + 1]);
        self.input_cursor += 2;

        self.copy_source = i | ((j & 0xf0) << 4);
        self.copy_remaining = (j & 0x0f) + THRESHOLD + 1;
        self.next()
    }
}

impl FusedIterator for Decoder<'_> {}

/// Decodes a whole LZS stream into an owned buffer.
pub fn decompress(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() * 2);
    output.extend(Decoder::new(input));
    output
}
