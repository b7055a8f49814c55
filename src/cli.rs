//! Uses clap to define the CLI interface declaratively.
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// configuration file (toml, yaml or json); defaults apply without one
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// how long to wait for each readiness check, in milliseconds (-1 forever)
    #[arg(short, long, default_value_t = 1000, allow_hyphen_values = true)]
    pub timeout: i32,
}
