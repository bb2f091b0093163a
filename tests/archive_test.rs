//! Archive and manager tests against triads written to disk

use std::fs;
use std::path::Path;

use ff8_unpack::{
    AnalyseOptions, Archive, ArchiveBuilder, ArchiveError, ArchiveKind, ArchiveManager,
    ArchiveState, Diagnostic, Triad,
};
use tempfile::TempDir;

fn write_triad(dir: &Path, base: &str, triad: &Triad) {
    triad.write_to(dir, base).unwrap();
}

/// Three levels: main -> field -> bgroom, with chara.one at every level.
fn nested_triad() -> Triad {
    let innermost = ArchiveBuilder::new()
        .compressed_file("c:\\ff8\\data\\eng\\field\\mapdata\\bg\\bgroom\\chara.one", b"deepest")
        .file("c:\\ff8\\data\\eng\\field\\mapdata\\bg\\bgroom\\bgroom.inf", &[1, 2, 3])
        .build();
    let middle = ArchiveBuilder::new()
        .file("c:\\ff8\\data\\eng\\field\\chara.one", b"middle")
        .triad("c:\\ff8\\data\\eng\\field\\mapdata\\bg\\bgroom", &innermost, true)
        .build();
    ArchiveBuilder::new()
        .compressed_file("c:\\ff8\\data\\eng\\chara.one", &b"top ".repeat(64))
        .triad("c:\\ff8\\data\\eng\\field", &middle, false)
        .file("c:\\ff8\\data\\eng\\readme.txt", b"hello")
        .build()
}

#[test]
fn discovery_skips_candidates_without_siblings() {
    let dir = TempDir::new().unwrap();
    write_triad(dir.path(), "main", &ArchiveBuilder::new().file("a\\x.bin", b"x").build());
    fs::write(dir.path().join("other.fs"), b"junk").unwrap();
    fs::write(dir.path().join("other.fl"), b"junk\n").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let manager = ArchiveManager::discover(dir.path()).unwrap();

    assert_eq!(manager.archives().len(), 1);
    assert_eq!(manager.archives()[0].name(), "main");
    assert_eq!(manager.archives()[0].kind(), ArchiveKind::Main);
    assert_eq!(manager.skipped().len(), 1);
    assert_eq!(manager.skipped()[0].name, "other");
    assert!(matches!(
        &manager.skipped()[0].reason,
        ArchiveError::MissingSibling { path } if path.ends_with("other.fi")
    ));
}

#[test]
fn garbage_archive_does_not_stop_the_scan() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.fs"), b"junk").unwrap();
    fs::write(dir.path().join("a.fi"), [0u8; 13]).unwrap();
    fs::write(dir.path().join("a.fl"), b"x\n").unwrap();
    write_triad(
        dir.path(),
        "main",
        &ArchiveBuilder::new().file("c:\\ff8\\chara.one", b"chara").build(),
    );

    let mut manager = ArchiveManager::discover(dir.path()).unwrap();
    assert_eq!(manager.archives().len(), 2);
    manager.analyse_all();

    assert_eq!(manager.archives().len(), 1);
    assert!(manager.get_by_name("main").unwrap().is_analysed());
    assert_eq!(manager.find_all_by_name("chara.one").len(), 1);
    assert_eq!(manager.skipped().len(), 1);
    assert_eq!(manager.skipped()[0].name, "a");
    assert!(matches!(manager.skipped()[0].reason, ArchiveError::IndexLength { len: 13 }));
}

#[test]
fn discovery_of_missing_folder_fails() {
    let dir = TempDir::new().unwrap();
    let result = ArchiveManager::discover(&dir.path().join("absent"));
    assert!(matches!(result, Err(ArchiveError::Io { .. })));
}

#[test]
fn lifecycle_on_disk() {
    let dir = TempDir::new().unwrap();
    write_triad(dir.path(), "menu", &ArchiveBuilder::new().compressed_file("m\\a.txt", b"aaaa").build());

    let mut archive = Archive::from_folder_and_name(dir.path(), "menu");
    assert_eq!(archive.state(), ArchiveState::Unloaded);

    archive.load().unwrap();
    assert_eq!(archive.state(), ArchiveState::Loaded);
    assert!(archive.entries().is_empty());

    archive.analyse().unwrap();
    assert_eq!(archive.state(), ArchiveState::Analysed);
    assert_eq!(archive.entries()[0].data, b"aaaa");

    archive.unload();
    assert_eq!(archive.state(), ArchiveState::Unloaded);
    assert!(archive.raw().is_none());

    // Analysing an unloaded archive reads the files again.
    archive.analyse().unwrap();
    assert_eq!(archive.entries()[0].data, b"aaaa");
}

#[test]
fn analyse_reports_missing_files() {
    let dir = TempDir::new().unwrap();
    let mut archive = Archive::from_folder_and_name(dir.path(), "world");
    assert!(matches!(archive.analyse(), Err(ArchiveError::Io { .. })));
}

#[test]
fn malformed_index_is_structural() {
    let triad = Triad { index: vec![0; 13], names: b"x\n".to_vec(), payload: vec![0; 8] };
    let mut archive = Archive::from_triad("bad", triad);
    assert!(matches!(archive.analyse(), Err(ArchiveError::IndexLength { len: 13 })));
}

#[test]
fn nested_archives_form_a_tree() {
    let mut archive = Archive::from_triad("main", nested_triad());
    archive.analyse().unwrap();

    let names: Vec<_> = archive.walk().iter().map(|a| a.name().to_owned()).collect();
    assert_eq!(names, vec!["main", "field", "bgroom"]);

    let field = &archive.children()[0];
    assert_eq!(field.kind(), ArchiveKind::Field);
    assert_eq!(field.children()[0].entries()[1].data, vec![1, 2, 3]);
}

#[test]
fn coverage_accounts_for_every_catalog_entry() {
    let mut archive = Archive::from_triad("main", nested_triad());
    archive.analyse().unwrap();

    for node in archive.walk() {
        assert_eq!(node.entries().len() + 3 * node.children().len(), node.catalog().len());
    }
}

#[test]
fn lookup_walks_parent_before_children() {
    let mut archive = Archive::from_triad("main", nested_triad());
    archive.analyse().unwrap();

    let found: Vec<_> = archive
        .find_all_by_name("chara.one")
        .iter()
        .map(|entry| entry.data.clone())
        .collect();
    assert_eq!(found, vec![b"top ".repeat(64), b"middle".to_vec(), b"deepest".to_vec()]);

    assert!(archive.find_all_by_name("field.fs").is_empty());
    assert!(archive.find_all_by_name("missing").is_empty());
}

#[test]
fn manager_concatenates_lookups() {
    let dir = TempDir::new().unwrap();
    write_triad(dir.path(), "main", &nested_triad());
    write_triad(
        dir.path(),
        "battle",
        &ArchiveBuilder::new().file("c:\\ff8\\data\\eng\\battle\\chara.one", b"battle").build(),
    );

    let mut manager = ArchiveManager::discover(dir.path()).unwrap();
    manager.load_all();
    manager.analyse_all();

    // Discovery is sorted, so battle precedes main.
    let found: Vec<_> = manager.find_all_by_name("chara.one").iter().map(|e| e.name.clone()).collect();
    assert_eq!(
        found,
        vec![
            "c:\\ff8\\data\\eng\\battle\\chara.one",
            "c:\\ff8\\data\\eng\\chara.one",
            "c:\\ff8\\data\\eng\\field\\chara.one",
            "c:\\ff8\\data\\eng\\field\\mapdata\\bg\\bgroom\\chara.one",
        ]
    );

    assert!(manager.get_by_name("battle").unwrap().is_analysed());
    manager.unload_all();
    assert!(manager.archives().iter().all(|a| a.state() == ArchiveState::Unloaded));
    assert!(manager.find_all_by_name("chara.one").is_empty());

    manager.analyse_by_name("battle").unwrap();
    assert_eq!(manager.find_all_by_name("chara.one").len(), 1);
}

#[test]
fn nested_can_be_turned_off() {
    let mut archive = Archive::from_triad("main", nested_triad());
    archive.analyse_with(AnalyseOptions { nested: false, check_lengths: true }).unwrap();

    assert!(archive.children().is_empty());
    assert_eq!(archive.entries().len(), archive.catalog().len());
    assert_eq!(archive.find_all_by_name("field.fs").len(), 1);
}

#[test]
fn built_archives_have_no_diagnostics() {
    let mut archive = Archive::from_triad("main", nested_triad());
    archive.analyse().unwrap();
    assert!(archive.walk().iter().all(|a| a.diagnostics().is_empty()));
}

#[test]
fn header_checks_can_be_disabled() {
    let mut triad = ArchiveBuilder::new().file("x", b"abc").build();
    triad.payload[0] = 0x7f;

    let mut checked = Archive::from_triad("a", triad.clone());
    checked.analyse().unwrap();
    assert!(matches!(checked.diagnostics(), [Diagnostic::HeaderMismatch { header: 0x7f, .. }]));

    let mut unchecked = Archive::from_triad("a", triad);
    unchecked
        .analyse_with(AnalyseOptions { check_lengths: false, ..AnalyseOptions::default() })
        .unwrap();
    assert!(unchecked.diagnostics().is_empty());
    assert_eq!(unchecked.entries()[0].data, b"abc");
}
