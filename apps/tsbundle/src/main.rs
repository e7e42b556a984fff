mod config;
mod reporter;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, Format};
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;
use tsbundle_core::{Bundler, FileSystem, HostFs, ModulePath};

#[derive(Parser)]
#[command(name = "tsbundle")]
#[command(about = "Collects the module graph of TypeScript/TSX projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve every module reachable from an entry file
    Bundle(Config),
}

fn main() -> Result<()> {
    env_logger::init();

    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(std::io::stdout());

    let cli = Cli::parse();
    debug!("Parsed CLI arguments: {:?}", cli.command);

    let start = Instant::now();

    match cli.command {
        Commands::Bundle(mut cfg) => {
            cfg.initialize()?;
            let order = cfg.emit_order();
            info!("Bundling {} ({:?} order)", cfg.entry.display(), order);

            let entry = std::env::current_dir()?.join(&cfg.entry);
            let entry = ModulePath::from_std_path(&entry)?;

            let mut fs = HostFs::new();
            let graph = Bundler::with_options(&mut fs, cfg.bundle_options())
                .bundle(&entry)
                .with_context(|| format!("Failed to bundle {}", cfg.entry.display()))?;
            debug!("Open handles after bundling: {}", fs.stat().open_handles);

            if let Some(output) = &cfg.output {
                let file = File::create(output)
                    .with_context(|| format!("Failed to create {}", output.display()))?;
                graph
                    .emit(order, &mut BufWriter::new(file))
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                info!("Wrote bundle to {}", output.display());
            }

            let elapsed_ms = start.elapsed().as_millis();

            match cfg.format {
                Format::Json => {
                    let report = reporter::BundleReport::from_graph(&graph, order);
                    reporter::print_json(&mut stdout, &report)?;
                }
                Format::Text => {
                    reporter::print_module_tree(&mut stdout, &graph, order)?;
                    writeln!(
                        stdout,
                        "\n{} Finished in {}ms on {} files.",
                        "●".bright_blue(),
                        elapsed_ms.to_string().cyan(),
                        graph.len().to_string().cyan()
                    )?;
                    stdout.flush()?;
                }
            }

            Ok(())
        }
    }
}
