// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Structural failures reported to the caller.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("index length {len} is not a multiple of the 12-byte record size")]
    IndexLength { len: usize },

    #[error("name table has {names} rows but the index has {entries} entries")]
    CountMismatch { names: usize, entries: usize },

    #[error("name table is not valid UTF-8: {0}")]
    NameTable(#[from] std::string::FromUtf8Error),

    #[error("missing sibling file {}", .path.display())]
    MissingSibling { path: PathBuf },

    #[error("archive {name} has no data loaded and no files to load it from")]
    NotLoaded { name: String },

    #[error("no archive named {name}")]
    UnknownArchive { name: String },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io { path: path.into(), source }
    }
}

/// Non-fatal anomalies noticed while analysing an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A base name carried some, but not exactly one of each, of the triad extensions.
    IncompleteTriad { base_name: String, members: Vec<String> },

    /// The entry's region fell outside the payload and was clamped.
    EntryOutOfRange { index: usize, start: usize, end: usize, payload_len: usize },

    /// The 4-byte header disagrees with the number of bytes stored after it.
    HeaderMismatch { index: usize, header: u32, stored: usize },

    /// The decoded entry is not as long as the index says it should be.
    LengthMismatch { index: usize, expected: u32, actual: usize },

    /// A nested triad failed to analyse; its rows were kept as plain entries.
    NestedArchive { base_name: String, error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::IncompleteTriad { base_name, members } => {
                write!(f, "incomplete nested archive {base_name}: only {}", members.join(", "))
            }
            Diagnostic::EntryOutOfRange { index, start, end, payload_len } => write!(
                f,
                "entry {index}: region {start:#x}..{end:#x} outside payload of {payload_len:#x} bytes"
            ),
            Diagnostic::HeaderMismatch { index, header, stored } => {
                write!(f, "entry {index}: header says {header:#x} bytes, {stored:#x} stored")
            }
            Diagnostic::LengthMismatch { index, expected, actual } => {
                write!(f, "entry {index}: expected {expected:#x} bytes, decoded {actual:#x}")
            }
            Diagnostic::NestedArchive { base_name, error } => {
                write!(f, "nested archive {base_name} kept as plain entries: {error}")
            }
        }
    }
}
