//! taskfold CLI entry point.

use clap::Parser;
use std::process::ExitCode;
use tf::cli::commands;
use tf::cli::{Cli, Commands};
use tf::error::Error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let root = cli.root.as_ref();
    let config_dir = cli.config_dir.as_ref();

    match &cli.command {
        Commands::Init { folder } => {
            commands::init::execute(folder.as_ref(), root, config_dir, json)
        }
        Commands::Root => commands::root::execute(root, config_dir, json),
        Commands::Version => commands::version::execute(json),

        // Change detection
        Commands::Scan {
            watch,
            interval,
            passes,
        } => commands::scan::execute(*watch, *interval, *passes, root, config_dir, json),
        Commands::Diagnostics => commands::diagnostics::execute(root, config_dir, json),

        // Tasks
        Commands::Task { command } => {
            commands::task::execute(command, root, config_dir, cli.actor.as_deref(), json)
        }

        // Conflicts
        Commands::Conflicts { command } => {
            commands::conflicts::execute(command, root, config_dir, json)
        }

        // Pending writes
        Commands::Journal { command } => {
            commands::journal::execute(command, root, config_dir, json)
        }

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
