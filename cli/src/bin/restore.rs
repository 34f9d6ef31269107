//! `restore` - restore a backup directory, merging it with its full backup.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use cli::Flag;
use engine::Configuration;

/// BackUP - restore a backup
#[derive(Parser, Debug)]
#[command(name = "restore")]
#[command(version)]
#[command(about = "Restore <destination>/<timestamp> backups into a directory")]
struct Args {
    /// Backup directory to restore (`<store>/<timestamp>`)
    source: PathBuf,

    /// Directory to restore into
    destination: PathBuf,

    /// Optional flag words
    #[arg(value_enum, value_name = "FLAG")]
    flags: Vec<Flag>,
}

fn main() {
    let argv: Vec<OsString> = std::env::args_os().collect();
    if argv.len() == 2 && argv[1] == "help" {
        let _ = Args::command().print_help();
        std::process::exit(0);
    }

    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(error) => std::process::exit(cli::usage_exit(error)),
    };

    let flags = cli::run_flags(&args.flags);
    cli::logging::init(flags.silent);

    let config = Configuration::restore(args.source, args.destination, flags);
    std::process::exit(cli::run_cli(&config));
}
