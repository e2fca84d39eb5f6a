// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for metricfeed

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metricfeed")]
#[command(about = "Template-driven HTTP metric collector")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load templates and keep every enabled instance running until Ctrl-C
    Run {
        #[arg(short, long, help = "Template directory (overrides config)")]
        templates: Option<PathBuf>,

        #[arg(short, long, help = "Settings file (overrides config)")]
        settings: Option<PathBuf>,
    },

    /// Execute every enabled instance once and print the collected metrics
    Once {
        #[arg(short, long, help = "Template directory (overrides config)")]
        templates: Option<PathBuf>,

        #[arg(short, long, help = "Settings file (overrides config)")]
        settings: Option<PathBuf>,

        #[arg(short, long, help = "Output format: text, json or yaml", default_value = "text")]
        format: String,
    },

    /// Report which template files in a directory load and which are skipped
    Validate {
        #[arg(help = "Template directory")]
        dir: PathBuf,
    },

    /// List loaded templates
    Templates {
        #[arg(short, long, help = "Template directory (overrides config)")]
        templates: Option<PathBuf>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
