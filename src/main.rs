// SPDX-License-Identifier: GPL-3.0-only

//! Command-line interface for hangouts2sms.
//!
//! This binary provides the `hangouts2sms` command for converting a Google
//! Hangouts export (`Hangouts.json` from Takeout) into SMS Backup & Restore
//! XML.

use hangouts2sms::{parser, renderer};
use lexopt::prelude::*;
use snafu::prelude::*;
use std::path::{Path, PathBuf};

/// Where to write the rendered document.
#[derive(Clone)]
enum OutputTarget {
    /// Write to the specified file.
    File(PathBuf),
    /// Write to stdout.
    Stdout,
}

struct Cli {
    input: PathBuf,
    output: OutputTarget,
    self_id: Option<String>,
    backup_date: Option<i64>,
    quiet: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseFile {
        path: PathBuf,
        source: parser::ParseError,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert Google Hangouts chat exports to SMS Backup & Restore XML

Usage: {name} [OPTIONS] <INPUT>

Arguments:
  <INPUT>  Hangouts.json export from Google Takeout

Options:
  -o, --output <OUTPUT>    Output file (default: stdout, - for stdout)
      --self-id <ID>       Use this participant id as the archive owner
                           instead of the frequency heuristic
      --backup-date <MS>   Fixed backup timestamp in epoch milliseconds
                           (default: current time)
  -q, --quiet              Suppress progress messages
  -f, --force              Overwrite an existing output file
  -h, --help               Print help
  -V, --version            Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input: Option<PathBuf> = None;
    let mut output = OutputTarget::Stdout;
    let mut self_id = None;
    let mut backup_date = None;
    let mut quiet = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::File(val)
                };
            }
            Long("self-id") => self_id = Some(parser.value()?.string()?),
            Long("backup-date") => {
                let val: i64 = parser
                    .value()?
                    .parse()
                    .map_err(|_| "backup-date must be an integer")?;
                backup_date = Some(val);
            }
            Short('q') | Long("quiet") => quiet = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) if input.is_none() => input = Some(val.parse()?),
            Value(_) => return Err("expected exactly one input file".into()),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input: input.ok_or("missing required argument: <INPUT>")?,
        output,
        self_id,
        backup_date,
        quiet,
        force,
    })
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;

    let json = std::fs::read_to_string(&cli.input).context(ReadFileSnafu { path: &cli.input })?;
    let mut archive = parser::parse_archive(&json).context(ParseFileSnafu { path: &cli.input })?;

    // An explicit owner id beats the frequency heuristic.
    if cli.self_id.is_some() {
        archive.self_id = cli.self_id.clone();
    } else if archive.self_id.is_none() && !cli.quiet {
        eprintln!("Could not discover the archive owner; consider --self-id");
    }

    if !cli.quiet
        && let Some(id) = archive.self_id.as_deref()
    {
        eprintln!(
            "Converting {} conversations (owner id {id})",
            archive.conversations.len()
        );
    }

    let opts = renderer::RenderOptions {
        backup_date: cli.backup_date,
    };
    let document = renderer::render_archive(&archive, &opts);

    match &cli.output {
        OutputTarget::Stdout => print!("{document}"),
        OutputTarget::File(path) => {
            if path.exists() && !cli.force {
                eprintln!(
                    "Skipping {} (already exists, use --force to overwrite)",
                    path.display()
                );
                return Ok(());
            }
            std::fs::write(path, document.to_string()).context(WriteFileSnafu { path })?;
            if !cli.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
