use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use driversync::cli::{CategoryAction, Cli, Commands};
use driversync::output::{self, Verbosity};
use driversync::{LOGS_DIR, SyncContext, SyncError, commands, logging};
use std::io;
use std::process;

/// Exit code when synchronization was skipped because no category is enabled.
const EXIT_SKIPPED: i32 = 2;

fn main() {
    if let Err(e) = run() {
        if e.downcast_ref::<SyncError>()
            .is_some_and(SyncError::is_policy_guard)
        {
            eprintln!("{} {}", "Warning:".yellow().bold(), e);
            process::exit(EXIT_SKIPPED);
        }
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);
    output::set_verbosity(verbosity);

    let logs_dir = match &cli.command {
        Commands::Completion { .. } | Commands::About => None,
        _ => SyncContext::default_data_dir()
            .ok()
            .map(|dir| dir.join(LOGS_DIR)),
    };
    logging::init(verbosity, logs_dir.as_deref());

    // Commands that must work without a configuration file
    match cli.command {
        Commands::Completion { shell } => {
            print_completions(shell, &mut Cli::command());
            return Ok(());
        }
        Commands::About => {
            commands::about::execute();
            return Ok(());
        }
        Commands::Init {
            ioverlay,
            crewchief,
            force,
        } => return commands::init::execute(ioverlay, crewchief, force),
        Commands::ResetConfig => {
            return commands::reset::execute(&SyncContext::default_config_path()?);
        }
        _ => {}
    }

    let mut ctx = SyncContext::new()?;

    match cli.command {
        Commands::Sync { preview } => commands::sync::execute(&ctx, preview)?,
        Commands::Backup { list } => commands::backup::execute(&ctx, list)?,
        Commands::Check { fix_duplicates } => commands::check::execute(&ctx, fix_duplicates)?,
        Commands::Export { path, category } => {
            commands::transfer::export(&ctx, &path, category.as_deref())?;
        }
        Commands::Import { path, preview } => commands::transfer::import(&ctx, &path, preview)?,
        Commands::Categories { action } => match action {
            None | Some(CategoryAction::List) => commands::categories::list(&ctx)?,
            Some(CategoryAction::Enable { name }) => {
                commands::categories::set_enabled(&mut ctx, &name, true)?;
            }
            Some(CategoryAction::Disable { name }) => {
                commands::categories::set_enabled(&mut ctx, &name, false)?;
            }
        },
        Commands::Analytics { reset } => commands::analytics::execute(&ctx, reset)?,
        Commands::Config {
            key,
            value,
            unset,
            list,
        } => commands::config::execute(&mut ctx, key.as_deref(), value, unset, list)?,
        Commands::RunScheduled {
            interval,
            background,
        } => commands::schedule::execute(&ctx, interval, background)?,
        Commands::Completion { .. }
        | Commands::About
        | Commands::Init { .. }
        | Commands::ResetConfig => {}
    }

    Ok(())
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
