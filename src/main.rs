// ff8-unpack
// Copyright (c) 2024 Matthew Costa <ucosty@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{command, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use ff8_unpack::catalog::PATH_SEPARATOR;
use ff8_unpack::{compress, decompress, Archive, ArchiveBuilder, ArchiveManager};

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log archive progress as well as warnings
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every archive in a folder, nested archives included
    List {
        /// Folder holding the .fs/.fi/.fl files
        folder: PathBuf,
    },

    /// Decompress and extract every file from the archives in a folder
    Unpack {
        /// Folder holding the .fs/.fi/.fl files
        folder: PathBuf,

        /// Path to extract files into
        output_path: PathBuf,
    },

    /// Print every file with the given name, at any depth
    Find {
        /// Folder holding the .fs/.fi/.fl files
        folder: PathBuf,

        /// Last component of the path, e.g. chara.one
        name: String,
    },

    /// Decompress a single LZS stream
    Decompress {
        input_file: PathBuf,
        output_file: PathBuf,
    },

    /// Compress a file into a single LZS stream
    Compress {
        input_file: PathBuf,
        output_file: PathBuf,
    },

    /// Build an archive from a folder tree
    Pack {
        /// Folder whose files become the archive entries
        input_path: PathBuf,

        /// Folder to write the .fs/.fi/.fl files into
        output_path: PathBuf,

        /// Base name of the archive, e.g. battle
        name: String,

        /// Prefix written before every path in the name table
        #[arg(long, default_value = "c:\\ff8\\data\\eng\\")]
        prefix: String,

        /// Store entries without LZS compression
        #[arg(long)]
        no_compress: bool,
    },
}

fn analysed_manager(folder: &Path) -> Result<ArchiveManager, Box<dyn Error>> {
    let mut manager = ArchiveManager::discover(folder)?;
    let skipped_on_discovery = manager.skipped().len();
    for skipped in manager.skipped() {
        eprintln!("skipping {}: {}", skipped.name, skipped.reason);
    }
    manager.analyse_all();
    for skipped in &manager.skipped()[skipped_on_discovery..] {
        eprintln!("skipping {}: {}", skipped.name, skipped.reason);
    }
    Ok(manager)
}

fn print_archive(archive: &Archive, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} ({:?})", indent, archive.name(), archive.kind());

    for entry in archive.entries() {
        println!("{}  {}: size = {:#x}", indent, entry.name, entry.data.len());
    }
    for diagnostic in archive.diagnostics() {
        println!("{}  warning: {}", indent, diagnostic);
    }
    for child in archive.children() {
        print_archive(child, depth + 1);
    }
}

fn list_command(folder: &Path) -> Result<(), Box<dyn Error>> {
    let manager = analysed_manager(folder)?;

    for archive in manager.archives() {
        print_archive(archive, 0);
    }

    Ok(())
}

/// Maps a name table path onto a relative output path, dropping drive
/// letters and anything that would climb out of the output folder.
fn relative_output_path(name: &str) -> PathBuf {
    name.split(PATH_SEPARATOR)
        .filter(|part| !part.is_empty() && *part != "." && *part != ".." && !part.ends_with(':'))
        .collect()
}

/// Returns `path`, or `path.1`, `path.2`, ... if it was already handed out.
fn unique_path(used: &mut HashSet<PathBuf>, path: PathBuf) -> PathBuf {
    if used.insert(path.clone()) {
        return path;
    }

    let mut suffix = 1;
    loop {
        let mut candidate = path.clone().into_os_string();
        candidate.push(format!(".{suffix}"));
        let candidate = PathBuf::from(candidate);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn unpack_archive(
    archive: &Archive,
    output_path: &Path,
    used: &mut HashSet<PathBuf>,
) -> Result<usize, Box<dyn Error>> {
    let mut written = 0;

    for entry in archive.entries() {
        let output_filename = unique_path(used, output_path.join(relative_output_path(&entry.name)));
        if let Some(parent) = output_filename.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output_filename, &entry.data)?;
        written += 1;
    }

    for child in archive.children() {
        let mut folder = relative_output_path(child.name());
        if folder.as_os_str().is_empty() {
            folder = PathBuf::from("_");
        }
        let child_path = unique_path(used, output_path.join(folder));
        written += unpack_archive(child, &child_path, used)?;
    }

    Ok(written)
}

fn unpack_command(folder: &Path, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let manager = analysed_manager(folder)?;

    for archive in manager.archives() {
        let mut used = HashSet::new();
        let written = unpack_archive(archive, &output_path.join(archive.name()), &mut used)?;
        println!("{}: {} files", archive.name(), written);
    }

    Ok(())
}

fn find_command(folder: &Path, name: &str) -> Result<(), Box<dyn Error>> {
    let manager = analysed_manager(folder)?;
    let found = manager.find_all_by_name(name);

    println!("{} found", found.len());
    for entry in found {
        println!("{}: size = {:#x}", entry.name, entry.data.len());
    }

    Ok(())
}

fn decompress_command(input_file: &Path, output_file: &Path) -> Result<(), Box<dyn Error>> {
    let input = fs::read(input_file)?;
    fs::write(output_file, decompress(&input))?;
    Ok(())
}

fn compress_command(input_file: &Path, output_file: &Path) -> Result<(), Box<dyn Error>> {
    let input = fs::read(input_file)?;
    fs::write(output_file, compress(&input))?;
    Ok(())
}

fn pack_command(
    input_path: &Path,
    output_path: &Path,
    name: &str,
    prefix: &str,
    compress: bool,
) -> Result<(), Box<dyn Error>> {
    let mut builder = ArchiveBuilder::new();
    let separator = PATH_SEPARATOR.to_string();

    for entry in WalkDir::new(input_path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(input_path)?;
        let parts: Vec<_> = relative.iter().map(|part| part.to_string_lossy()).collect();
        let archive_path = format!("{}{}", prefix, parts.join(separator.as_str()));

        builder.add_file(&archive_path, &fs::read(entry.path())?, compress);
    }

    fs::create_dir_all(output_path)?;
    builder.build().write_to(output_path, name)?;
    println!("{}: {} files", name, builder.len());

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::List { folder } => list_command(folder)?,
        Commands::Unpack { folder, output_path } => unpack_command(folder, output_path)?,
        Commands::Find { folder, name } => find_command(folder, name)?,
        Commands::Decompress { input_file, output_file } => decompress_command(input_file, output_file)?,
        Commands::Compress { input_file, output_file } => compress_command(input_file, output_file)?,
        Commands::Pack { input_path, output_path, name, prefix, no_compress } => {
            pack_command(input_path, output_path, name, prefix, !no_compress)?
        }
    }

    Ok(())
}
