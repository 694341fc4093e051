use std::path::PathBuf;

use anyhow::{Context as _, Result};
use caldera_core::frame::{FrameDescriptor, FrameKind};
use caldera_core::io::fits::read_fits_header;
use caldera_core::io::loader::{is_fits, load_frame};
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS, TIFF or PNG file
    pub file: PathBuf,

    /// Print every FITS header card
    #[arg(long)]
    pub header: bool,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let header = if is_fits(&args.file) {
        Some(
            read_fits_header(&args.file)
                .with_context(|| format!("Failed to read {}", args.file.display()))?,
        )
    } else {
        None
    };

    let kind = header
        .as_ref()
        .and_then(|h| h.get_str("IMAGETYP"))
        .and_then(FrameKind::parse);
    let frame = load_frame(&FrameDescriptor::new(
        &args.file,
        kind.unwrap_or(FrameKind::Bias),
        0.0,
        None,
        None,
    ))?;
    let stats = frame.stats();

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}", frame.width(), frame.height());
    println!("Bit depth:   {}", frame.bit_depth);
    if let Some(kind) = kind {
        println!("Frame type:  {}", kind);
    }
    if let Some(ref h) = header {
        if let Some(t) = h.first_f64(&["EXPTIME", "EXPOSURE"]) {
            println!("Exposure:    {}s", t);
        }
        if let Some(g) = h.get_i64("GAIN") {
            println!("Gain:        {}", g);
        }
        if let Some(f) = h.get_str("FILTER") {
            println!("Filter:      {}", f.trim());
        }
    }
    println!("Mean:        {:.2}", stats.mean);
    println!("Median:      {:.2}", stats.median);
    println!("Std dev:     {:.2}", stats.std_dev);
    println!("Min / max:   {:.1} / {:.1}", stats.min, stats.max);

    if args.header {
        if let Some(ref h) = header {
            println!();
            for key in h.keywords() {
                if let Some(value) = h.get(key) {
                    println!("  {:<8} = {}", key, value);
                }
            }
        }
    }

    Ok(())
}
