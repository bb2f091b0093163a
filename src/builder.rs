// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

use tracing::trace;

use crate::archive::{Triad, INDEX_EXTENSION, NAMES_EXTENSION, PAYLOAD_EXTENSION};
use crate::catalog::{Catalog, CatalogEntry};
use crate::compress::Encoder;

struct PendingFile {
    path: String,
    data: Vec<u8>,
    compress: bool,
}

/// Assembles index, name table and payload bytes for a new archive.
///
/// Every payload region is written as a 4-byte little-endian length of the
/// stored body followed by the body, raw or LZS compressed.
#[derive(Default)]
pub struct ArchiveBuilder {
    files: Vec<PendingFile>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str, data: &[u8], compress: bool) -> &mut Self {
        self.files.push(PendingFile { path: path.to_owned(), data: data.to_vec(), compress });
        self
    }

    /// Adds the three files of `triad` as `base_path.fs`, `.fi` and `.fl`.
    pub fn add_triad(&mut self, base_path: &str, triad: &Triad, compress: bool) -> &mut Self {
        self.add_file(&format!("{base_path}.{PAYLOAD_EXTENSION}"), &triad.payload, compress);
        self.add_file(&format!("{base_path}.{INDEX_EXTENSION}"), &triad.index, compress);
        self.add_file(&format!("{base_path}.{NAMES_EXTENSION}"), &triad.names, compress)
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.add_file(path, data, false);
        self
    }

    pub fn compressed_file(mut self, path: &str, data: &[u8]) -> Self {
        self.add_file(path, data, true);
        self
    }

    pub fn triad(mut self, base_path: &str, triad: &Triad, compress: bool) -> Self {
        self.add_triad(base_path, triad, compress);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn build(&self) -> Triad {
        let mut encoder = Encoder::new();
        let mut payload = Vec::new();
        let mut entries = Vec::with_capacity(self.files.len());
        let mut names = String::new();

        for file in &self.files {
            let body = if file.compress { encoder.encode(&file.data) } else { file.data.clone() };
            trace!("{}: {:#x} -> {:#x} bytes", file.path, file.data.len(), body.len());

            entries.push(CatalogEntry {
                unpacked_length: file.data.len() as u32,
                payload_offset: payload.len() as u32,
                compressed: file.compress,
            });

            payload.extend_from_slice(&(body.len() as u32).to_le_bytes());
            payload.extend_from_slice(&body);

            names.push_str(&file.path);
            names.push_str("\r\n");
        }

        Triad {
            index: Catalog::from_entries(entries).to_bytes(),
            names: names.into_bytes(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_builds_empty_triad() {
        let triad = ArchiveBuilder::new().build();
        assert_eq!(triad, Triad::default());
    }

    #[test]
    fn layout_matches_index() {
        let triad = ArchiveBuilder::new()
            .file("a\\one", &[1; 12])
            .file("a\\two", &[2; 20])
            .build();

        assert_eq!(triad.payload.len(), 40);
        let catalog = Catalog::parse(&triad.index).unwrap();
        assert_eq!(catalog.entries()[0].payload_offset, 0);
        assert_eq!(catalog.entries()[1].payload_offset, 16);
        assert_eq!(&triad.payload[16..20], &20u32.to_le_bytes());
        assert_eq!(triad.names, b"a\\one\r\na\\two\r\n");
    }

    #[test]
    fn compressed_entry_records_unpacked_length() {
        let data = vec![7u8; 500];
        let triad = ArchiveBuilder::new().compressed_file("x", &data).build();
        let entry = Catalog::parse(&triad.index).unwrap().entries()[0];

        assert!(entry.compressed);
        assert_eq!(entry.unpacked_length, 500);
        assert!(triad.payload.len() < 100);
    }
}
