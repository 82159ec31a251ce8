//! replfs: command-line access to a MicroPython board's filesystem.
//!
//! ```text
//! ┌──────────┐   clap    ┌───────┐  raw REPL  ┌─────────────┐  serial  ┌───────┐
//! │ terminal │──────────▶│ Shell │───────────▶│ SerialBoard │─────────▶│ board │
//! └──────────┘           └───────┘            └─────────────┘          └───────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;

use replfs::config::ShellConfig;
use replfs::listing::EntryKind;
use replfs::repl::{LinkEvents, Shell};
use replfs::serial::SerialBoard;

#[derive(Parser)]
#[command(version, about = "Browse and edit a MicroPython board's filesystem over its REPL")]
struct Args {
    /// Serial device the board is attached to
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// JSON file with shell settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Show SHA-256 of files
        #[arg(long)]
        hash: bool,
    },
    /// Show one entry
    Stat { path: String },
    /// Print a remote file
    Cat { path: String },
    /// Copy a remote file to the host
    Get { remote: String, local: PathBuf },
    /// Copy a host file to the board and verify it
    Put { local: PathBuf, remote: String },
    /// Remove a file
    Rm { path: String },
    /// Rename a file or directory
    Mv { from: String, to: String },
    /// Create a directory
    Mkdir { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Free space on the board
    Df,
    /// Run code and print its output
    Exec {
        code: String,
        /// Timeout in seconds
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
    /// Reboot the board
    Reset,
}

fn load_config(path: Option<&PathBuf>) -> Result<ShellConfig> {
    let Some(path) = path else {
        return Ok(ShellConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    ShellConfig::from_json(&text).with_context(|| format!("loading {}", path.display()))
}

fn kind_tag(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "f",
        EntryKind::Directory => "d",
        EntryKind::Error => "?",
    }
}

fn run(shell: &mut Shell<SerialBoard>, command: Command) -> Result<()> {
    match command {
        Command::Ls { path, recursive, hash } => {
            for entry in shell.list(&path, recursive, hash)? {
                let hash = entry.hash.as_deref().unwrap_or("");
                println!(
                    "{} {:>8} {} {}",
                    kind_tag(entry.kind),
                    entry.size,
                    entry.full_name,
                    hash
                );
            }
        }
        Command::Stat { path } => match shell.file_stat(&path)? {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => bail!("{path}: no such file or directory"),
        },
        Command::Cat { path } => {
            let contents = shell.read_file(&path)?;
            print!("{}", contents.text);
        }
        Command::Get { remote, local } => {
            let contents = shell.read_file(&remote)?;
            std::fs::write(&local, &contents.bytes)
                .with_context(|| format!("writing {}", local.display()))?;
            info!("{} -> {} ({} bytes)", remote, local.display(), contents.bytes.len());
        }
        Command::Put { local, remote } => {
            let content =
                std::fs::read(&local).with_context(|| format!("reading {}", local.display()))?;
            shell.write_file(&remote, &content)?;
            if !shell.verify_hash(&remote, &content)? {
                bail!("{remote}: hash mismatch after upload");
            }
            info!("{} -> {} ({} bytes)", local.display(), remote, content.len());
        }
        Command::Rm { path } => shell.remove_file(&path)?,
        Command::Mv { from, to } => shell.rename_file(&from, &to)?,
        Command::Mkdir { path } => shell.create_dir(&path)?,
        Command::Rmdir { path } => shell.remove_dir(&path)?,
        Command::Df => println!("{}", shell.free_space()?),
        Command::Exec { code, timeout } => {
            print!("{}", shell.eval(&code, Duration::from_secs(timeout))?);
        }
        Command::Reset => shell.reset()?,
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let events = Arc::new(LinkEvents::new());
    let board = SerialBoard::open(&args.port, args.baud, Arc::clone(&events))
        .with_context(|| format!("opening {}", args.port))?;
    let mut shell = Shell::new(board, config, events)?;

    let is_reset = matches!(args.command, Command::Reset);
    shell.initialise()?;
    let result = run(&mut shell, args.command);

    if !is_reset {
        let closed = shell.clean_close();
        result?;
        closed?;
        return Ok(());
    }
    result
}
