use anyhow::Result;
use clap::Parser;

use zipwatch::Settings;
use zipwatch::cli::commands;
use zipwatch::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    zipwatch::logging::init_with_config(&config.logging);

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Settings) -> Result<()> {
    match command {
        Commands::Zip { dir, output, root } => {
            commands::archive::run_zip(&dir, &output, root, config)
        }
        Commands::Unzip {
            archive,
            dest,
            delete,
        } => commands::archive::run_unzip(&archive, &dest, delete),
        Commands::List { archive } => commands::archive::run_list(&archive),
        Commands::Cat { archive, entry } => commands::archive::run_cat(&archive, &entry),
        Commands::Watch { files } => commands::watch::run_watch(&files, config),
        Commands::Config => commands::config::run_config(config),
    }
}
