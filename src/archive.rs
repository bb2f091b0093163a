// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace, warn};

use crate::catalog::{self, Catalog, HEADER_SIZE};
use crate::decompress::decompress;
use crate::error::{ArchiveError, Diagnostic, Result};

pub const PAYLOAD_EXTENSION: &str = "fs";
pub const INDEX_EXTENSION: &str = "fi";
pub const NAMES_EXTENSION: &str = "fl";

/// Role of a top-level archive, taken from its base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Main,
    Menu,
    World,
    Field,
    Magic,
    Battle,
    Unknown,
}

impl ArchiveKind {
    pub const KNOWN: [(&'static str, ArchiveKind); 6] = [
        ("main", ArchiveKind::Main),
        ("menu", ArchiveKind::Menu),
        ("world", ArchiveKind::World),
        ("field", ArchiveKind::Field),
        ("magic", ArchiveKind::Magic),
        ("battle", ArchiveKind::Battle),
    ];

    pub fn from_name(name: &str) -> ArchiveKind {
        Self::KNOWN
            .iter()
            .find(|(known, _)| *known == name)
            .map_or(ArchiveKind::Unknown, |(_, kind)| *kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    Unloaded,
    Loaded,
    Analysed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyseOptions {
    /// Turn embedded triads into child archives.
    pub nested: bool,
    /// Record header and unpacked length mismatches as diagnostics.
    pub check_lengths: bool,
}

impl Default for AnalyseOptions {
    fn default() -> Self {
        AnalyseOptions { nested: true, check_lengths: true }
    }
}

/// The three files backing an archive, as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Triad {
    pub index: Vec<u8>,
    pub names: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Triad {
    /// Writes `base.fs`, `base.fi` and `base.fl` into `dir`.
    pub fn write_to(&self, dir: &Path, base: &str) -> Result<()> {
        let paths = TriadPaths::new(dir, base);
        for (path, data) in [
            (&paths.payload, &self.payload),
            (&paths.index, &self.index),
            (&paths.names, &self.names),
        ] {
            fs::write(path, data).map_err(|e| ArchiveError::io(path, e))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriadPaths {
    pub payload: PathBuf,
    pub index: PathBuf,
    pub names: PathBuf,
}

impl TriadPaths {
    pub fn new(dir: &Path, base: &str) -> TriadPaths {
        TriadPaths {
            payload: dir.join(format!("{base}.{PAYLOAD_EXTENSION}")),
            index: dir.join(format!("{base}.{INDEX_EXTENSION}")),
            names: dir.join(format!("{base}.{NAMES_EXTENSION}")),
        }
    }

    fn read(&self) -> Result<Triad> {
        let read = |path: &PathBuf| fs::read(path).map_err(|e| ArchiveError::io(path, e));
        Ok(Triad {
            index: read(&self.index)?,
            names: read(&self.names)?,
            payload: read(&self.payload)?,
        })
    }
}

/// One resolved file of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl DecodedEntry {
    pub fn short_name(&self) -> &str {
        catalog::short_name(&self.name)
    }
}

#[derive(Debug)]
pub struct Archive {
    name: String,
    kind: ArchiveKind,
    paths: Option<TriadPaths>,
    raw: Option<Triad>,
    analysed: Option<AnalyseOptions>,
    catalog: Catalog,
    names: Vec<String>,
    entries: Vec<DecodedEntry>,
    children: Vec<Archive>,
    diagnostics: Vec<Diagnostic>,
}

impl Archive {
    fn with_name(name: String, paths: Option<TriadPaths>) -> Archive {
        debug!("Creating archive for {}", name);
        Archive {
            kind: ArchiveKind::from_name(&name),
            name,
            paths,
            raw: None,
            analysed: None,
            catalog: Catalog::default(),
            names: Vec::new(),
            entries: Vec::new(),
            children: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Archive backed by three files on disk. The name is the payload's file stem.
    pub fn from_paths(paths: TriadPaths) -> Archive {
        let name = paths
            .payload
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::with_name(name, Some(paths))
    }

    pub fn from_folder_and_name(dir: &Path, name: &str) -> Archive {
        Self::with_name(name.to_owned(), Some(TriadPaths::new(dir, name)))
    }

    /// Archive whose bytes are already in memory, as for nested triads.
    pub fn from_triad(name: &str, triad: Triad) -> Archive {
        let mut archive = Self::with_name(name.to_owned(), None);
        archive.load_from(triad);
        archive
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn paths(&self) -> Option<&TriadPaths> {
        self.paths.as_ref()
    }

    pub fn state(&self) -> ArchiveState {
        match (&self.raw, self.analysed) {
            (Some(_), Some(_)) => ArchiveState::Analysed,
            (Some(_), None) => ArchiveState::Loaded,
            (None, _) => ArchiveState::Unloaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.raw.is_some()
    }

    pub fn is_analysed(&self) -> bool {
        self.state() == ArchiveState::Analysed
    }

    pub fn raw(&self) -> Option<&Triad> {
        self.raw.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Decoded entries, minus any that were turned into child archives.
    pub fn entries(&self) -> &[DecodedEntry] {
        &self.entries
    }

    pub fn children(&self) -> &[Archive] {
        &self.children
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Reads the three files from disk.
    pub fn load(&mut self) -> Result<()> {
        let paths = self
            .paths
            .as_ref()
            .ok_or_else(|| ArchiveError::NotLoaded { name: self.name.clone() })?;
        let triad = paths.read()?;
        self.load_from(triad);
        Ok(())
    }

    /// Takes the three buffers verbatim. Nothing is parsed until [`Archive::analyse`].
    pub fn load_from(&mut self, triad: Triad) {
        debug!(
            "Loaded {}: index {:#x}, names {:#x}, payload {:#x} bytes",
            self.name,
            triad.index.len(),
            triad.names.len(),
            triad.payload.len()
        );
        self.clear_analysis();
        self.raw = Some(triad);
    }

    pub fn unload(&mut self) {
        debug!("Unloading {}", self.name);
        self.raw = None;
        self.analysed = None;
        self.catalog = Catalog::default();
        self.names.clear();
        self.entries.clear();
        self.diagnostics.clear();
        for child in &mut self.children {
            child.unload();
        }
    }

    fn clear_analysis(&mut self) {
        self.analysed = None;
        self.catalog = Catalog::default();
        self.names.clear();
        self.entries.clear();
        self.children.clear();
        self.diagnostics.clear();
    }

    pub fn analyse(&mut self) -> Result<()> {
        self.analyse_with(AnalyseOptions::default())
    }

    /// Analyses the loaded bytes, loading them first if needed. Calling it
    /// again with the same options is a no-op; different options re-analyse.
    pub fn analyse_with(&mut self, options: AnalyseOptions) -> Result<()> {
        if self.analysed == Some(options) {
            return Ok(());
        }
        if self.raw.is_none() {
            debug!("{} wasn't loaded", self.name);
            self.load()?;
        }
        self.clear_analysis();

        let Some(raw) = self.raw.as_ref() else {
            return Err(ArchiveError::NotLoaded { name: self.name.clone() });
        };

        let names = catalog::parse_names(&raw.names)?;
        let catalog = Catalog::parse(&raw.index)?;
        if names.len() != catalog.len() {
            return Err(ArchiveError::CountMismatch { names: names.len(), entries: catalog.len() });
        }

        let mut decoded = Vec::with_capacity(catalog.len());
        let mut diagnostics = Vec::new();
        for (index, name) in names.iter().enumerate() {
            let data = decode_entry(&catalog, index, &raw.payload, options, &mut diagnostics);
            trace!("{}: entry {} {} -> {:#x} bytes", self.name, index, name, data.len());
            decoded.push(Some(DecodedEntry { name: name.clone(), data }));
        }

        let mut children = Vec::new();
        if options.nested {
            for group in find_triads(&names, &mut diagnostics) {
                let mut take = |index: usize| {
                    decoded[index].take().map(|entry| entry.data).unwrap_or_default()
                };
                let triad = Triad {
                    payload: take(group.payload),
                    index: take(group.index),
                    names: take(group.names),
                };

                debug!("{}: nested archive {}", self.name, group.base_name);
                let mut child = Archive::from_triad(&group.base_name, triad);
                match child.analyse_with(options) {
                    Ok(()) => children.push(child),
                    Err(error) => {
                        diagnostics.push(Diagnostic::NestedArchive {
                            base_name: group.base_name.clone(),
                            error: error.to_string(),
                        });
                        let triad = child.raw.take().unwrap_or_default();
                        for (row, data) in [
                            (group.payload, triad.payload),
                            (group.index, triad.index),
                            (group.names, triad.names),
                        ] {
                            decoded[row] = Some(DecodedEntry { name: names[row].clone(), data });
                        }
                    }
                }
            }
        }

        for diagnostic in &diagnostics {
            warn!("{}: {}", self.name, diagnostic);
        }

        self.catalog = catalog;
        self.names = names;
        self.entries = decoded.into_iter().flatten().collect();
        self.children = children;
        self.diagnostics = diagnostics;
        self.analysed = Some(options);

        debug!(
            "Analysed {}: {} entries, {} nested archives",
            self.name,
            self.entries.len(),
            self.children.len()
        );
        Ok(())
    }

    /// Every decoded entry whose short name is `short_name`, this archive's own
    /// entries first, then each child's in order.
    pub fn find_all_by_name(&self, short_name: &str) -> Vec<&DecodedEntry> {
        let mut found = Vec::new();
        self.collect_by_name(short_name, &mut found);
        found
    }

    fn collect_by_name<'a>(&'a self, short_name: &str, found: &mut Vec<&'a DecodedEntry>) {
        if self.analysed.is_none() {
            debug!("find_all_by_name: {} not analysed", self.name);
            return;
        }
        found.extend(self.entries.iter().filter(|entry| entry.short_name() == short_name));
        for child in &self.children {
            child.collect_by_name(short_name, found);
        }
    }

    /// This archive followed by all of its descendants, depth first.
    pub fn walk(&self) -> Vec<&Archive> {
        let mut archives = vec![self];
        for child in &self.children {
            archives.extend(child.walk());
        }
        archives
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Archive(name:{}, loaded:{}, analysed:{})",
            self.name,
            self.is_loaded(),
            self.is_analysed()
        )
    }
}

fn decode_entry(
    catalog: &Catalog,
    index: usize,
    payload: &[u8],
    options: AnalyseOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<u8> {
    let entry = catalog.entries()[index];
    let region = catalog.region(index, payload.len());

    let start = region.start.saturating_add(HEADER_SIZE).min(payload.len());
    let end = region.end.min(payload.len());
    if region.start + HEADER_SIZE > region.end || region.end > payload.len() {
        diagnostics.push(Diagnostic::EntryOutOfRange {
            index,
            start: region.start,
            end: region.end,
            payload_len: payload.len(),
        });
    }
    let body = if start < end { &payload[start..end] } else { &[][..] };

    if options.check_lengths && region.start + HEADER_SIZE <= payload.len() {
        let header = LittleEndian::read_u32(&payload[region.start..region.start + HEADER_SIZE]);
        if header as usize != body.len() {
            diagnostics.push(Diagnostic::HeaderMismatch { index, header, stored: body.len() });
        }
    }

    let data = if entry.compressed { decompress(body) } else { body.to_vec() };

    if options.check_lengths && data.len() != entry.unpacked_length as usize {
        diagnostics.push(Diagnostic::LengthMismatch {
            index,
            expected: entry.unpacked_length,
            actual: data.len(),
        });
    }

    data
}

#[derive(Debug, PartialEq, Eq)]
struct TriadGroup {
    base_name: String,
    payload: usize,
    index: usize,
    names: usize,
}

/// Groups name table rows by base name and returns the complete triads, in
/// order of first appearance. Groups with a missing or repeated member are
/// left alone and reported.
fn find_triads(names: &[String], diagnostics: &mut Vec<Diagnostic>) -> Vec<TriadGroup> {
    let mut groups: BTreeMap<&str, (usize, Vec<usize>)> = BTreeMap::new();

    for (row, name) in names.iter().enumerate() {
        let (base_name, extension) = catalog::split_extension(catalog::short_name(name));
        let Some(extension) = extension else { continue };
        if triad_extension_slot(extension).is_none() {
            continue;
        }
        groups.entry(base_name).or_insert_with(|| (row, Vec::new())).1.push(row);
    }

    let mut ordered: Vec<_> = groups.into_iter().collect();
    ordered.sort_by_key(|(_, (first, _))| *first);

    let mut triads = Vec::new();
    for (base_name, (_, rows)) in ordered {
        let mut slots = [None; 3];
        let mut repeated = false;
        for &row in &rows {
            let (_, extension) = catalog::split_extension(catalog::short_name(&names[row]));
            if let Some(slot) = extension.and_then(triad_extension_slot) {
                repeated |= slots[slot].replace(row).is_some();
            }
        }

        match slots {
            [Some(payload), Some(index), Some(names_row)] if !repeated => triads.push(TriadGroup {
                base_name: base_name.to_owned(),
                payload,
                index,
                names: names_row,
            }),
            _ => diagnostics.push(Diagnostic::IncompleteTriad {
                base_name: base_name.to_owned(),
                members: rows.iter().map(|&row| names[row].clone()).collect(),
            }),
        }
    }

    triads
}

fn triad_extension_slot(extension: &str) -> Option<usize> {
    [PAYLOAD_EXTENSION, INDEX_EXTENSION, NAMES_EXTENSION]
        .iter()
        .position(|known| extension.eq_ignore_ascii_case(known))
}
