// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the GitHub metadata backup (contains pulls/ and issues/)
    #[arg(short, long)]
    pub backup: PathBuf,

    /// Path to a JSON file mapping old usernames to new ones: {"old": "new", ...}
    #[arg(long)]
    pub username_map: Option<PathBuf>,

    /// Where to write the aggregated JSON report
    #[arg(short, long, default_value = "data.json")]
    pub output: PathBuf,

    /// Include the per-PR activity profiles for heatmap rendering
    #[arg(long)]
    pub profiles: bool,
}
