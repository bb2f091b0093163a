// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::io::Cursor;
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{ArchiveError, Result};

/// Size of one index record: unpacked length, payload offset, compression flag.
pub const RECORD_SIZE: usize = 12;

/// Every payload region starts with a little-endian length header.
pub const HEADER_SIZE: usize = 4;

/// Path separator used inside name tables.
pub const PATH_SEPARATOR: char = '\\';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub unpacked_length: u32,
    pub payload_offset: u32,
    pub compressed: bool,
}

/// Parsed index file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn parse(index: &[u8]) -> Result<Catalog> {
        if index.len() % RECORD_SIZE != 0 {
            return Err(ArchiveError::IndexLength { len: index.len() });
        }

        let count = index.len() / RECORD_SIZE;
        let mut reader = Cursor::new(index);
        let mut entries = Vec::with_capacity(count);

        for _ in 0..count {
            let unpacked_length = read_u32(&mut reader)?;
            let payload_offset = read_u32(&mut reader)?;
            let compressed = read_u32(&mut reader)? != 0;

            entries.push(CatalogEntry { unpacked_length, payload_offset, compressed });
        }

        Ok(Catalog { entries })
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Catalog {
        Catalog { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte range of entry `index` inside a payload of `payload_len` bytes,
    /// header included. The region runs up to where the next entry begins.
    pub fn region(&self, index: usize, payload_len: usize) -> Range<usize> {
        let start = self.entries[index].payload_offset as usize;
        let end = match self.entries.get(index + 1) {
            Some(next) => next.payload_offset as usize,
            None => payload_len,
        };

        start..end
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut index = Vec::with_capacity(self.entries.len() * RECORD_SIZE);
        for entry in &self.entries {
            index.extend_from_slice(&entry.unpacked_length.to_le_bytes());
            index.extend_from_slice(&entry.payload_offset.to_le_bytes());
            index.extend_from_slice(&u32::from(entry.compressed).to_le_bytes());
        }
        index
    }
}

fn read_u32(reader: &mut Cursor<&[u8]>) -> Result<u32> {
    let len = reader.get_ref().len();
    reader
        .read_u32::<LittleEndian>()
        .map_err(|_| ArchiveError::IndexLength { len })
}

/// Splits a name table into one path per line.
pub fn parse_names(names: &[u8]) -> Result<Vec<String>> {
    let text = String::from_utf8(names.to_vec())?;
    Ok(text.lines().map(str::to_owned).collect())
}

/// Final path component, the name used for lookups.
pub fn short_name(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Splits a short name into `(base name, extension)`.
pub fn split_extension(short_name: &str) -> (&str, Option<&str>) {
    match short_name.rsplit_once('.') {
        Some((base, extension)) => (base, Some(extension)),
        None => (short_name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unpacked: u32, offset: u32, flag: u32) -> Vec<u8> {
        [unpacked, offset, flag].iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn parses_fixed_records() {
        let mut index = record(12, 0, 0);
        index.extend(record(300, 16, 1));
        index.extend(record(7, 40, 0x0100));

        let catalog = Catalog::parse(&index).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.entries()[1],
            CatalogEntry { unpacked_length: 300, payload_offset: 16, compressed: true }
        );
        assert!(catalog.entries()[2].compressed);
        assert!(!catalog.entries()[0].compressed);
    }

    #[test]
    fn empty_index_has_no_entries() {
        assert!(Catalog::parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn rejects_partial_record() {
        let mut index = record(1, 0, 0);
        index.push(0);
        assert!(matches!(Catalog::parse(&index), Err(ArchiveError::IndexLength { len: 13 })));
    }

    #[test]
    fn regions_end_at_next_offset() {
        let mut index = record(12, 0, 0);
        index.extend(record(20, 16, 0));
        let catalog = Catalog::parse(&index).unwrap();

        assert_eq!(catalog.region(0, 40), 0..16);
        assert_eq!(catalog.region(1, 40), 16..40);
    }

    #[test]
    fn index_bytes_round_trip() {
        let mut index = record(5, 0, 1);
        index.extend(record(9, 12, 0));
        assert_eq!(Catalog::parse(&index).unwrap().to_bytes(), index);
    }

    #[test]
    fn names_split_on_line_endings() {
        let names = parse_names(b"c:\\ff8\\a.txt\r\nc:\\ff8\\b.bin\n").unwrap();
        assert_eq!(names, vec!["c:\\ff8\\a.txt", "c:\\ff8\\b.bin"]);
    }

    #[test]
    fn non_utf8_names_are_rejected() {
        assert!(matches!(parse_names(&[0xff, 0xfe]), Err(ArchiveError::NameTable(_))));
    }

    #[test]
    fn short_name_and_extension() {
        assert_eq!(short_name("c:\\ff8\\data\\eng\\field\\chara.one"), "chara.one");
        assert_eq!(short_name("plain"), "plain");
        assert_eq!(split_extension("chara.one"), ("chara", Some("one")));
        assert_eq!(split_extension("noext"), ("noext", None));
    }
}
