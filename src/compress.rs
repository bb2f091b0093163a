// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

//! LZS encoder.
//!
//! Longest matches are found with a binary search tree over the window,
//! rooted at one of 256 buckets picked by the first byte of each position.
//! Output framing mirrors [`crate::decompress`].

use crate::decompress::{MAX_MATCH, THRESHOLD, WINDOW_MASK, WINDOW_SIZE, WINDOW_START};

/// Marks an empty child or parent link.
const NIL: usize = WINDOW_SIZE;

/// First root bucket; bucket `b` lives at `ROOT + b`.
const ROOT: usize = WINDOW_SIZE + 1;

pub struct Encoder {
    window: Vec<u8>,
    left: Vec<usize>,
    right: Vec<usize>,
    parent: Vec<usize>,
    match_position: usize,
    match_length: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            window: vec![0; WINDOW_SIZE + MAX_MATCH - 1],
            left: vec![NIL; WINDOW_SIZE + 1],
            right: vec![NIL; WINDOW_SIZE + 257],
            parent: vec![NIL; WINDOW_SIZE + 1],
            match_position: 0,
            match_length: 0,
        }
    }

    fn reset(&mut self) {
        self.window.fill(0);
        self.left.fill(NIL);
        self.right.fill(NIL);
        self.parent.fill(NIL);
        self.match_position = 0;
        self.match_length = 0;
    }

    /// Inserts the string starting at `r` and records the longest match seen
    /// on the way down. A full length match replaces the older node.
    fn insert_node(&mut self, r: usize) {
        let mut cmp: i32 = 1;
        let mut p = ROOT + usize::from(self.window[r]);
        self.left[r] = NIL;
        self.right[r] = NIL;
        self.match_length = 0;

        loop {
            if cmp >= 0 {
                if self.right[p] != NIL {
                    p = self.right[p];
                } else {
                    self.right[p] = r;
                    self.parent[r] = p;
                    return;
                }
            } else if self.left[p] != NIL {
                p = self.left[p];
            } else {
                self.left[p] = r;
                self.parent[r] = p;
                return;
            }

            let mut i = 1;
            while i < MAX_MATCH {
                cmp = i32::from(self.window[r + i]) - i32::from(self.window[p + i]);
                if cmp != 0 {
                    break;
                }
                i += 1;
            }

            if i > self.match_length {
                self.match_position = p;
                self.match_length = i;
                if i >= MAX_MATCH {
                    break;
                }
            }
        }

        self.parent[r] = self.parent[p];
        self.left[r] = self.left[p];
        self.right[r] = self.right[p];
        self.parent[self.left[p]] = r;
        self.parent[self.right[p]] = r;
        self.replace_child(p, r);
        self.parent[p] = NIL;
    }

    fn delete_node(&mut self, p: usize) {
        if self.parent[p] == NIL {
            return;
        }

        let q = if self.right[p] == NIL {
            self.left[p]
        } else if self.left[p] == NIL {
            self.right[p]
        } else {
            let mut q = self.left[p];
            if self.right[q] != NIL {
                while self.right[q] != NIL {
                    q = self.right[q];
                }
                self.right[self.parent[q]] = self.left[q];
                self.parent[self.left[q]] = self.parent[q];
                self.left[q] = self.left[p];
                self.parent[self.left[p]] = q;
            }
            self.right[q] = self.right[p];
            self.parent[self.right[p]] = q;
            q
        };

        self.parent[q] = self.parent[p];
        self.replace_child(p, q);
        self.parent[p] = NIL;
    }

    fn replace_child(&mut self, old: usize, new: usize) {
        let parent = self.parent[old];
        if self.right[parent] == old {
            self.right[parent] = new;
        } else {
            self.left[parent] = new;
        }
    }

    fn store(&mut self, position: usize, byte: u8) {
        self.window[position] = byte;
        // Mirror the head of the ring so comparisons can run past its end.
        if position < MAX_MATCH - 1 {
            self.window[position + WINDOW_SIZE] = byte;
        }
    }

    pub fn encode(&mut self, input: &[u8]) -> Vec<u8> {
        self.reset();

        let mut output = Vec::with_capacity(input.len() / 2 + 16);
        let mut input = input.iter().copied();

        let mut group = [0u8; 17];
        let mut group_len = 1;
        let mut mask: u16 = 1;

        let mut s = 0;
        let mut r = WINDOW_START;

        let mut lookahead = 0;
        while lookahead < MAX_MATCH {
            match input.next() {
                Some(byte) => self.window[r + lookahead] = byte,
                None => break,
            }
            lookahead += 1;
        }
        if lookahead == 0 {
            return output;
        }

        for i in 1..=MAX_MATCH {
            self.insert_node(r - i);
        }
        self.insert_node(r);

        while lookahead > 0 {
            if self.match_length > lookahead {
                self.match_length = lookahead;
            }

            if self.match_length <= THRESHOLD {
                self.match_length = 1;
                group[0] |= mask as u8;
                group[group_len] = self.window[r];
                group_len += 1;
            } else {
                group[group_len] = (self.match_position & 0xff) as u8;
                group[group_len + 1] = (((self.match_position >> 4) & 0xf0)
                    | (self.match_length - (THRESHOLD + 1))) as u8;
                group_len += 2;
            }

            mask <<= 1;
            if mask == 0x100 {
                output.extend_from_slice(&group[..group_len]);
                group[0] = 0;
                group_len = 1;
                mask = 1;
            }

            let last_match_length = self.match_length;
            let mut consumed = 0;
            while consumed < last_match_length {
                let Some(byte) = input.next() else { break };
                self.delete_node(s);
                self.store(s, byte);
                s = (s + 1) & WINDOW_MASK;
                r = (r + 1) & WINDOW_MASK;
                self.insert_node(r);
                consumed += 1;
            }

            // Input is exhausted: keep sliding until the lookahead drains.
            while consumed < last_match_length {
                self.delete_node(s);
                s = (s + 1) & WINDOW_MASK;
                r = (r + 1) & WINDOW_MASK;
                lookahead -= 1;
                if lookahead > 0 {
                    self.insert_node(r);
                }
                consumed += 1;
            }
        }

        if group_len > 1 {
            output.extend_from_slice(&group[..group_len]);
        }

        output
    }
}

/// Compresses `input` into an LZS stream.
pub fn compress(input: &[u8]) -> Vec<u8> {
    Encoder::new().encode(input)
}
