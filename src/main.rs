mod commands;
mod config;
mod diagnostics;
mod error;
mod extract;
mod frontmatter;
mod index;
mod linkgen;
mod range;
mod rewrite;
mod scanner;
mod types;
mod vault;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "carve",
    about = "Move markdown sections between notes, rewriting every link that would break"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a byte-offset selection into another note
    Extract {
        /// Vault-relative path of the source note
        source: PathBuf,
        /// Vault-relative path of the destination note
        dest: PathBuf,
        /// Selection start, as a byte offset into the source
        #[arg(long)]
        start: usize,
        /// Selection end, as a byte offset into the source
        #[arg(long)]
        end: usize,
        /// Vault root directory
        #[arg(long, default_value = ".")]
        vault: PathBuf,
    },
    /// Extract the heading section around a cursor line
    Heading {
        /// Vault-relative path of the source note
        source: PathBuf,
        /// Vault-relative path of the destination note
        dest: PathBuf,
        /// One-based line number of the cursor
        #[arg(long)]
        line: usize,
        /// Vault root directory
        #[arg(long, default_value = ".")]
        vault: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            source,
            dest,
            start,
            end,
            vault,
        } => commands::extract_selection(&vault, &source, &dest, start, end),
        Commands::Heading {
            source,
            dest,
            line,
            vault,
        } => commands::extract_heading(&vault, &source, &dest, line),
    };

    return match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}
