// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Reader and writer for FF8 file system archives.
//!
//! An archive is three files sharing a base name: `.fi` (index), `.fl` (name
//! table) and `.fs` (payload). Entries may be LZS compressed, and an archive
//! may carry further archives inside it.
//!
//! ```no_run
//! use std::path::Path;
//! use ff8_unpack::ArchiveManager;
//!
//! let mut manager = ArchiveManager::discover(Path::new("Data"))?;
//! manager.analyse_all();
//! for entry in manager.find_all_by_name("chara.one") {
//!     println!("{}: {} bytes", entry.name, entry.data.len());
//! }
//! # Ok::<(), ff8_unpack::ArchiveError>(())
//! ```

pub mod archive;
pub mod builder;
pub mod catalog;
pub mod compress;
pub mod decompress;
pub mod error;
pub mod manager;

pub use archive::{AnalyseOptions, Archive, ArchiveKind, ArchiveState, DecodedEntry, Triad, TriadPaths};
pub use builder::ArchiveBuilder;
pub use catalog::{Catalog, CatalogEntry};
pub use compress::compress;
pub use decompress::{decompress, Decoder};
pub use error::{ArchiveError, Diagnostic, Result};
pub use manager::{ArchiveManager, SkippedCandidate};
