//! xtask for driversync - build automation and tooling
//!
//! Currently generates man pages from the shared clap definitions.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Subcommands that get their own man page in addition to driversync(1).
const PAGED_SUBCOMMANDS: &[&str] = &["sync", "backup", "check", "export", "import", "categories", "config", "run-scheduled"];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for driversync")]
enum Task {
    /// Generate man pages from clap definitions
    GenerateManPages {
        /// Output directory for man pages (default: ./man)
        #[arg(short, long, default_value = "man")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    match Task::parse() {
        Task::GenerateManPages { output } => generate_man_pages(&output)?,
    }
    Ok(())
}

fn render(cmd: clap::Command, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create man page: {}", path.display()))?;
    clap_mangen::Man::new(cmd).render(&mut BufWriter::new(file))?;
    println!("✓ Generated: {}", path.display());
    Ok(())
}

fn generate_man_pages(output_dir: &Path) -> Result<()> {
    println!("Generating man pages...");

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let mut cmd = driversync::cli::Cli::command();
    render(cmd.clone(), &output_dir.join("driversync.1"))?;

    for name in PAGED_SUBCOMMANDS {
        if let Some(subcmd) = cmd.find_subcommand_mut(name) {
            let subcmd = subcmd.clone().name(format!("driversync-{name}"));
            render(subcmd, &output_dir.join(format!("driversync-{name}.1")))?;
        }
    }

    println!("\nMan pages successfully generated in: {}", output_dir.display());
    println!("\nTo view the man pages:");
    println!("  man {}/driversync.1", output_dir.display());
    println!("\nTo install system-wide (requires root):");
    println!("  sudo cp {}/*.1 /usr/share/man/man1/", output_dir.display());
    println!("  sudo mandb");

    Ok(())
}
