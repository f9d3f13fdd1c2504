use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_FILE: &str = "acadreport.sqlite3";
const DB_ENTRY: &str = "db/acadreport.sqlite3";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
pub const BUNDLE_FORMAT_V1: &str = "acadreport-workspace-v1";
pub const LEGACY_SQLITE_FORMAT: &str = "legacy-sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes the workspace database into a zip bundle at `out_path`. The caller
/// checkpoints the WAL first so the main file is complete.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let db_sha256 = sha256_hex(&db_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "dbEntry": DB_ENTRY,
        "dbSha256": db_sha256,
        "dbBytes": db_bytes.len(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;

    let workspace_meta = json!({
        "sourceWorkspace": workspace_path.to_string_lossy(),
    });
    zip.start_file(META_WORKSPACE_ENTRY, opts)
        .context("failed to start workspace metadata entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&workspace_meta)
            .context("failed to serialize workspace metadata")?
            .as_bytes(),
    )
    .context("failed to write workspace metadata entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
        db_sha256,
    })
}

/// Replaces the workspace database with the one in `in_path`. The bundle is
/// fully read and verified before the existing file is touched.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = workspace_path.join(DB_FILE);

    if !is_zip_file(in_path)? {
        if !is_sqlite_file(in_path)? {
            return Err(anyhow!(
                "not a workspace bundle or SQLite database: {}",
                in_path.to_string_lossy()
            ));
        }
        let bytes = std::fs::read(in_path).with_context(|| {
            format!(
                "failed to read legacy sqlite backup {}",
                in_path.to_string_lossy()
            )
        })?;
        swap_in_database(workspace_path, &dst, &bytes)?;
        return Ok(ImportSummary {
            bundle_format_detected: LEGACY_SQLITE_FORMAT.to_string(),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest.json missing dbSha256"))?
        .to_ascii_lowercase();

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {}", DB_ENTRY))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;

    let actual_sha = sha256_hex(&db_bytes);
    if actual_sha != expected_sha {
        return Err(anyhow!(
            "database checksum mismatch: manifest {}, bundle {}",
            expected_sha,
            actual_sha
        ));
    }

    swap_in_database(workspace_path, &dst, &db_bytes)?;
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
    })
}

fn swap_in_database(workspace_path: &Path, dst: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp_dst = workspace_path.join(format!("{}.importing", DB_FILE));
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }
    let mut out = File::create(&tmp_dst).with_context(|| {
        format!(
            "failed to create temp database {}",
            tmp_dst.to_string_lossy()
        )
    })?;
    out.write_all(bytes)
        .context("failed to write extracted database")?;
    out.flush().context("failed to flush extracted database")?;
    drop(out);

    // Stale WAL/SHM files belong to the old database.
    for suffix in ["-wal", "-shm"] {
        let side = workspace_path.join(format!("{}{}", DB_FILE, suffix));
        if side.exists() {
            std::fs::remove_file(&side).with_context(|| {
                format!("failed to remove {}", side.to_string_lossy())
            })?;
        }
    }
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(&tmp_dst, dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;
    Ok(())
}

fn read_signature<const N: usize>(path: &Path) -> anyhow::Result<Option<[u8; N]>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; N];
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(Some(sig)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<4>(path)? == Some([0x50, 0x4B, 0x03, 0x04]))
}

fn is_sqlite_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<16>(path)?.as_ref() == Some(b"SQLite format 3\0"))
}
