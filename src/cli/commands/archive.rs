//! Archive commands: zip, unzip, list, cat.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::archive::{ArchiveError, ZipReader, ZipWriter};
use crate::config::{AddAllRoot, Settings};

/// Archive `dir` into `output`.
///
/// Files that could not be read are reported on stderr; the archive is
/// still written with everything else, and the command fails afterwards.
pub fn run_zip(dir: &Path, output: &Path, root: Option<AddAllRoot>, settings: &Settings) -> Result<()> {
    let mut config = settings.archive.clone();
    if let Some(root) = root {
        config.add_all_root = root;
    }

    let mut writer = ZipWriter::create_with(output, &config)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let skipped = match writer.add_all_from(dir) {
        Ok(_) => 0,
        Err(ArchiveError::Bulk(report)) => {
            for failure in &report.failures {
                eprintln!("  skipped {}: {}", failure.entry, failure.error);
            }
            report.failures.len()
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };

    let entries = writer.len();
    writer
        .finish()
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {entries} entries to {}", output.display());
    if skipped > 0 {
        bail!("{skipped} files could not be added");
    }
    Ok(())
}

/// Extract `archive` into `dest`, optionally deleting it afterwards.
///
/// The archive is kept whenever any entry failed to extract.
pub fn run_unzip(archive: &Path, dest: &Path, delete: bool) -> Result<()> {
    match ZipReader::into_dir(archive, dest, delete) {
        Ok(extracted) => {
            println!("Extracted {} entries to {}", extracted.len(), dest.display());
            if delete {
                println!("Deleted {}", archive.display());
            }
            Ok(())
        }
        Err(ArchiveError::Bulk(report)) => {
            eprintln!(
                "Extracted {} entries before failing",
                report.completed.len()
            );
            Err(ArchiveError::Bulk(report).into())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to unzip {}", archive.display())),
    }
}

/// Print every entry name, one per line.
pub fn run_list(archive: &Path) -> Result<()> {
    let reader =
        ZipReader::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;

    let mut stdout = std::io::stdout().lock();
    for name in reader.entries() {
        writeln!(stdout, "{name}")?;
    }
    Ok(())
}

/// Write the raw contents of one entry to stdout.
pub fn run_cat(archive: &Path, entry: &str) -> Result<()> {
    let mut reader =
        ZipReader::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    let data = reader.extract(entry)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}
