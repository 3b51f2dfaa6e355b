//! mpqread - command-line tool for reading files out of MPQ archives

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

mod commands;
mod config;
mod output;

// Global context for commands to access
pub static GLOBAL_OPTS: OnceLock<GlobalOptions> = OnceLock::new();

/// Default size of the pieces `cat` reads and writes
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub output: OutputFormat,
    pub verbose: u8,
    pub quiet: bool,
    pub no_color: bool,
    pub verify_checksums: bool,
    pub memory_map: bool,
    pub chunk_size: usize,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            output: OutputFormat::Text,
            verbose: 0,
            quiet: false,
            no_color: false,
            verify_checksums: true,
            memory_map: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Options set up by `main`, or the defaults when running outside of it
pub fn global_options() -> &'static GlobalOptions {
    GLOBAL_OPTS.get_or_init(GlobalOptions::default)
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "mpqread",
    about = "Read files out of MPQ archives",
    long_about = None,
    after_help = "EXAMPLES:
    # Show archive information
    mpqread info game.mpq

    # List files named in the (listfile)
    mpqread list game.mpq

    # List every stored file, with generated names for unnamed ones
    mpqread list game.mpq --all

    # Print 256 bytes of a file starting at offset 1024
    mpqread cat game.mpq war3map.j --offset 1024 --length 256

    # Extract all listed files
    mpqread extract game.mpq -t extracted/

    # Verify sector checksums of every listed file
    mpqread verify game.mpq

SHELL COMPLETION:
    Bash:
        mpqread completion bash > ~/.bash_completion.d/mpqread.bash

    Zsh:
        mpqread completion zsh > ~/.zsh/completions/_mpqread

    Fish:
        mpqread completion fish > ~/.config/fish/completions/mpqread.fish

    PowerShell:
        mpqread completion powershell >> $PROFILE"
)]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(global = true, short = 'o', long, value_enum)]
    output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(global = true, short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(global = true, short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable colored output
    #[arg(global = true, long)]
    no_color: bool,

    /// Configuration file (default: ~/.mpqread/config.toml or ~/.config/mpqread/config.toml)
    #[arg(global = true, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip sector checksum verification
    #[arg(global = true, long)]
    no_verify: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show archive information
    Info {
        /// Path to the MPQ archive
        archive: String,
    },
    /// List files in an archive
    List {
        /// Path to the MPQ archive
        archive: String,
        /// Show every stored file, including ones missing from the (listfile)
        #[arg(short, long)]
        all: bool,
    },
    /// Write a file, or a byte range of it, to stdout
    Cat {
        /// Path to the MPQ archive
        archive: String,
        /// File inside the archive
        file: String,
        /// First byte to write
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Number of bytes to write (default: to the end of the file)
        #[arg(long)]
        length: Option<u64>,
    },
    /// Extract files from an archive
    Extract {
        /// Path to the MPQ archive
        archive: String,
        /// Target directory
        #[arg(short, long, default_value = ".")]
        target: String,
        /// Specific file to extract (if not specified, extracts all listed files)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Read every listed file and check its sector checksums
    Verify {
        /// Path to the MPQ archive
        archive: String,
    },
    /// Generate shell completion scripts
    #[command(about = "Generate completion scripts for your shell")]
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let output = match (cli.output, config.default_output.as_deref()) {
        (Some(output), _) => output,
        (None, Some(name)) => OutputFormat::from_str(name, true)
            .map_err(|e| anyhow::anyhow!("Invalid default_output in configuration: {}", e))?,
        (None, None) => OutputFormat::Text,
    };

    // Set up colored output based on flags
    if cli.no_color || output != OutputFormat::Text {
        colored::control::set_override(false);
    }

    // Configure logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let global_opts = GlobalOptions {
        output,
        verbose: cli.verbose,
        quiet: cli.quiet,
        no_color: cli.no_color,
        verify_checksums: !cli.no_verify && config.verify_checksums.unwrap_or(true),
        memory_map: config.memory_map.unwrap_or(false),
        chunk_size: config
            .chunk_size
            .filter(|&size| size > 0)
            .unwrap_or(DEFAULT_CHUNK_SIZE),
    };
    log::debug!("Options: {:?}", global_opts);

    GLOBAL_OPTS
        .set(global_opts)
        .map_err(|_| anyhow::anyhow!("Global options already initialized"))?;

    match cli.command {
        Commands::Info { archive } => commands::info::info(&archive)?,
        Commands::List { archive, all } => commands::list::list(&archive, all)?,
        Commands::Cat {
            archive,
            file,
            offset,
            length,
        } => commands::cat::cat(&archive, &file, offset, length)?,
        Commands::Extract {
            archive,
            target,
            file,
        } => commands::extract::extract(&archive, &target, file.as_deref())?,
        Commands::Verify { archive } => commands::verify::verify(&archive)?,
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}
