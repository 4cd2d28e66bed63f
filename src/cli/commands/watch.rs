//! Watch command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::events::EventDispatcher;
use crate::watcher::{FileWatchEvent, FileWatchFilter, FileWatchRegistry};

/// Watch `files` and print `changed: <path>` for each change, until stdin
/// reaches end of file.
pub fn run_watch(files: &[PathBuf], settings: &Settings) -> Result<()> {
    let dispatcher = EventDispatcher::new();
    let mut registry = FileWatchRegistry::new(&settings.watch, dispatcher.clone())
        .context("Failed to start file watcher")?;

    for file in files {
        registry
            .watch_file(file)
            .with_context(|| format!("Failed to watch {}", file.display()))?;

        let label = file.clone();
        dispatcher.listen(FileWatchFilter::new(file), move |_: &FileWatchEvent| {
            println!("changed: {}", label.display());
        });
    }

    eprintln!(
        "Watching {} files (close stdin to stop)",
        registry.len()
    );

    // Block until stdin is closed; input itself is discarded
    std::io::copy(&mut std::io::stdin().lock(), &mut std::io::sink())?;

    registry.shutdown();
    Ok(())
}
