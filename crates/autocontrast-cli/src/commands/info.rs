use std::path::PathBuf;

use anyhow::{Context, Result};
use autocontrast_core::io::read_pnm;
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Input PNM file (P5 or P6)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let image = read_pnm(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let header = image.header();

    println!("File:        {}", args.file.display());
    println!("Format:      {}", header.format);
    println!("Dimensions:  {}x{}", header.width, header.height);
    println!("Channels:    {}", header.format.channels());
    println!("Max value:   {}", header.max_value);
    println!("Samples:     {}", image.buffer.len());

    let total_mb = image.buffer.len() as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
