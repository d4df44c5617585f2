use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
pub struct Cli {
    /// Host directory to copy into the image
    #[arg(long, short)]
    pub source: PathBuf,

    /// Image file to create
    #[arg(long, short)]
    pub out: PathBuf,

    /// Image size in 512-byte sectors
    #[arg(long, default_value_t = 16 * 2048)]
    pub sectors: usize,
}
