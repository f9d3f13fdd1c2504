#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn fake_sqlite(payload: &[u8]) -> Vec<u8> {
    let mut bytes = b"SQLite format 3\0".to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

fn read_entry(bundle: &PathBuf, name: &str) -> Vec<u8> {
    let f = File::open(bundle).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut out = Vec::new();
    archive
        .by_name(name)
        .expect("entry")
        .read_to_end(&mut out)
        .expect("read entry");
    out
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("acadreport-backup-src");
    let workspace2 = temp_dir("acadreport-backup-dst");
    let out_dir = temp_dir("acadreport-backup-out");

    let bytes = fake_sqlite(b"grade-3-marks");
    std::fs::write(workspace.join("acadreport.sqlite3"), &bytes).expect("write source db");

    let bundle_path = out_dir.join("workspace.acadreport.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 3);
    assert_eq!(export.db_sha256.len(), 64);

    let manifest: serde_json::Value =
        serde_json::from_slice(&read_entry(&bundle_path, "manifest.json")).expect("manifest json");
    assert_eq!(manifest["format"].as_str(), Some(backup::BUNDLE_FORMAT_V1));
    assert_eq!(manifest["dbSha256"].as_str(), Some(export.db_sha256.as_str()));
    assert_eq!(read_entry(&bundle_path, "db/acadreport.sqlite3"), bytes);
    read_entry(&bundle_path, "meta/workspace.json");

    // Stale WAL from the replaced database must not survive the import.
    std::fs::write(workspace2.join("acadreport.sqlite3-wal"), b"stale").expect("write wal");
    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);

    let restored = std::fs::read(workspace2.join("acadreport.sqlite3")).expect("read restored db");
    assert_eq!(restored, bytes);
    assert!(!workspace2.join("acadreport.sqlite3-wal").exists());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn tampered_database_entry_is_rejected() {
    let workspace = temp_dir("acadreport-tamper-src");
    let target = temp_dir("acadreport-tamper-dst");
    let out_dir = temp_dir("acadreport-tamper-out");

    std::fs::write(workspace.join("acadreport.sqlite3"), fake_sqlite(b"original"))
        .expect("write source db");
    let bundle = out_dir.join("good.zip");
    backup::export_workspace_bundle(&workspace, &bundle).expect("export");

    let manifest = read_entry(&bundle, "manifest.json");
    let tampered = out_dir.join("tampered.zip");
    {
        let f = File::create(&tampered).expect("create tampered");
        let mut zip = zip::ZipWriter::new(f);
        let opts = FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest");
        zip.write_all(&manifest).expect("write manifest");
        zip.start_file("db/acadreport.sqlite3", opts).expect("db");
        zip.write_all(&fake_sqlite(b"edited")).expect("write db");
        zip.finish().expect("finish");
    }

    let existing = fake_sqlite(b"keep-me");
    std::fs::write(target.join("acadreport.sqlite3"), &existing).expect("write target db");

    let e = backup::import_workspace_bundle(&tampered, &target).expect_err("checksum mismatch");
    assert!(e.to_string().contains("checksum"), "{}", e);
    let after = std::fs::read(target.join("acadreport.sqlite3")).expect("read target");
    assert_eq!(after, existing);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(target);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn plain_sqlite_file_imports_as_legacy_backup() {
    let src_dir = temp_dir("acadreport-legacy-src");
    let target = temp_dir("acadreport-legacy-dst");

    let legacy = src_dir.join("old-backup.sqlite3");
    let bytes = fake_sqlite(b"legacy");
    std::fs::write(&legacy, &bytes).expect("write legacy");

    let import = backup::import_workspace_bundle(&legacy, &target).expect("import legacy");
    assert_eq!(import.bundle_format_detected, backup::LEGACY_SQLITE_FORMAT);
    assert_eq!(
        std::fs::read(target.join("acadreport.sqlite3")).expect("read"),
        bytes
    );

    let junk = src_dir.join("notes.txt");
    std::fs::write(&junk, b"just some text, not a database").expect("write junk");
    assert!(backup::import_workspace_bundle(&junk, &target).is_err());
    assert_eq!(
        std::fs::read(target.join("acadreport.sqlite3")).expect("read"),
        bytes
    );

    let _ = std::fs::remove_dir_all(src_dir);
    let _ = std::fs::remove_dir_all(target);
}

#[test]
fn export_without_database_fails() {
    let workspace = temp_dir("acadreport-backup-empty");
    let out = workspace.join("out.zip");
    assert!(backup::export_workspace_bundle(&workspace, &out).is_err());
    let _ = std::fs::remove_dir_all(workspace);
}
