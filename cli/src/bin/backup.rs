//! `backup` - take a full or incremental backup of a directory tree.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use cli::Flag;
use engine::{BackupKind, Configuration};

/// BackUP - back up a directory tree
#[derive(Parser, Debug)]
#[command(name = "backup")]
#[command(version)]
#[command(about = "Take a full or incremental backup into <destination>/<timestamp>")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy the whole source tree
    Full(Target),
    /// Copy only what changed since the newest full backup in the destination
    Incremental(Target),
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Directory to back up
    source: PathBuf,

    /// Directory holding the timestamped backups
    destination: PathBuf,

    /// Optional flag words
    #[arg(value_enum, value_name = "FLAG")]
    flags: Vec<Flag>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => std::process::exit(cli::usage_exit(error)),
    };

    let (kind, target) = match args.command {
        Command::Full(target) => (BackupKind::Full, target),
        Command::Incremental(target) => (BackupKind::Incremental, target),
    };

    if target.flags.contains(&Flag::Override) {
        let error = Args::command().error(ErrorKind::InvalidValue, "'override' only applies to restore");
        std::process::exit(cli::usage_exit(error));
    }

    let flags = cli::run_flags(&target.flags);
    cli::logging::init(flags.silent);

    let config = Configuration::backup(kind, target.source, target.destination, flags);
    std::process::exit(cli::run_cli(&config));
}
