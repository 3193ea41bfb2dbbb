//! mded-lsp entry point.

use clap::Parser;
use mded_lsp::cli::{self, Cli, Commands, EXIT_ERROR};

fn main() {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    let result = match &cli.command {
        None | Some(Commands::Serve) => cli::run_serve(),
        Some(Commands::Check(args)) => cli::run_check(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
