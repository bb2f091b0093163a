// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::archive::{Archive, ArchiveKind, DecodedEntry, TriadPaths, PAYLOAD_EXTENSION};
use crate::error::{ArchiveError, Result};

/// A payload file found during discovery that could not become an archive.
#[derive(Debug)]
pub struct SkippedCandidate {
    pub name: String,
    pub reason: ArchiveError,
}

/// Flat collection of top-level archives, usually the contents of one folder.
#[derive(Debug, Default)]
pub struct ArchiveManager {
    archives: Vec<Archive>,
    skipped: Vec<SkippedCandidate>,
}

impl ArchiveManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every payload file in `dir` that has both sibling files.
    /// Candidates with a missing sibling are skipped, not fatal.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut manager = Self::new();
        manager.preload_folder(dir)?;
        Ok(manager)
    }

    /// Registers the well-known archives without checking they exist.
    pub fn from_default_names(dir: &Path) -> Self {
        let archives = ArchiveKind::KNOWN
            .iter()
            .map(|(name, _)| Archive::from_folder_and_name(dir, name))
            .collect();
        ArchiveManager { archives, skipped: Vec::new() }
    }

    pub fn preload_folder(&mut self, dir: &Path) -> Result<()> {
        let mut payloads: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| ArchiveError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == PAYLOAD_EXTENSION))
            .collect();
        payloads.sort();

        for payload in payloads {
            let name = payload
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let paths = TriadPaths::new(dir, &name);

            let missing = [&paths.index, &paths.names]
                .into_iter()
                .find(|path| !path.is_file())
                .cloned();

            match missing {
                Some(missing) => {
                    warn!("File {} doesn't exist, skipping {}", missing.display(), name);
                    self.skipped.push(SkippedCandidate {
                        name,
                        reason: ArchiveError::MissingSibling { path: missing },
                    });
                }
                None => {
                    debug!("Found archive {}", name);
                    self.archives.push(Archive::from_paths(paths));
                }
            }
        }

        Ok(())
    }

    pub fn push(&mut self, archive: Archive) {
        self.archives.push(archive);
    }

    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    pub fn skipped(&self) -> &[SkippedCandidate] {
        &self.skipped
    }

    /// Loads every archive. Archives that fail are moved to [`Self::skipped`].
    pub fn load_all(&mut self) {
        self.retain_working(Archive::load);
    }

    /// Analyses every archive. Archives that fail are moved to [`Self::skipped`].
    pub fn analyse_all(&mut self) {
        self.retain_working(Archive::analyse);
    }

    fn retain_working(&mut self, mut step: impl FnMut(&mut Archive) -> Result<()>) {
        let mut working = Vec::with_capacity(self.archives.len());
        for mut archive in self.archives.drain(..) {
            match step(&mut archive) {
                Ok(()) => working.push(archive),
                Err(reason) => {
                    warn!("{}: {}, skipping", archive.name(), reason);
                    archive.unload();
                    self.skipped.push(SkippedCandidate { name: archive.name().to_owned(), reason });
                }
            }
        }
        self.archives = working;
    }

    pub fn unload_all(&mut self) {
        for archive in &mut self.archives {
            archive.unload();
        }
    }

    pub fn load_by_name(&mut self, name: &str) -> Result<()> {
        self.require_mut(name)?.load()
    }

    pub fn analyse_by_name(&mut self, name: &str) -> Result<()> {
        self.require_mut(name)?.analyse()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Archive> {
        self.archives.iter().find(|archive| archive.name() == name)
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut Archive> {
        self.archives.iter_mut().find(|archive| archive.name() == name)
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Archive> {
        self.get_by_name_mut(name)
            .ok_or_else(|| ArchiveError::UnknownArchive { name: name.to_owned() })
    }

    /// Matches from every archive, in archive order.
    pub fn find_all_by_name(&self, short_name: &str) -> Vec<&DecodedEntry> {
        self.archives
            .iter()
            .flat_map(|archive| archive.find_all_by_name(short_name))
            .collect()
    }
}

impl fmt::Display for ArchiveManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for archive in &self.archives {
            writeln!(f, "{archive}")?;
        }
        Ok(())
    }
}
