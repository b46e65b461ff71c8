//! CLI definitions and plumbing.

use std::path::Path;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// A configuration file, by default `shapec.toml` next to the input
    #[arg(short = 'c', long, global = true)]
    pub config: Option<Box<Path>>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Type check a program and report its diagnostics
    Check {
        input: Box<Path>,
        /// Print the type of the program
        #[arg(short = 't', long)]
        types: bool,
    },
    /// Check a program and emit it as JavaScript
    Emit {
        input: Box<Path>,
        #[arg(short = 'o', long = "output")]
        output: Option<Box<Path>>,
    },
}
