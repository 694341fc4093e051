use std::collections::BTreeMap;

use anyhow::Result;
use caldera_core::frame::FrameKind;
use caldera_core::source::FrameSource;
use clap::Args;

use super::{format_gain, Context, KindArg};

#[derive(Args)]
pub struct ScanArgs {
    /// Calibration session name
    pub session: String,

    /// Only list frames of this kind
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// Print every frame instead of a grouped summary
    #[arg(long)]
    pub list: bool,
}

pub fn run(args: &ScanArgs, ctx: &Context) -> Result<()> {
    let source = ctx.source();
    let kinds = match args.kind {
        Some(k) => vec![FrameKind::from(k)],
        None => vec![FrameKind::Bias, FrameKind::Dark, FrameKind::Flat],
    };

    println!("Session {}", args.session);
    for kind in kinds {
        let frames = source.frames(&args.session, kind)?;
        println!("  {:<6} {} frame(s)", kind, frames.len());

        if args.list {
            for f in &frames {
                println!(
                    "    {}  {}s  gain {}  {}",
                    f.path.display(),
                    f.exposure_time,
                    format_gain(f.gain),
                    f.filter.as_deref().unwrap_or("")
                );
            }
            continue;
        }

        let mut groups: BTreeMap<(String, String, String), usize> = BTreeMap::new();
        for f in &frames {
            let key = (
                format!("{}s", f.exposure_time),
                format_gain(f.gain),
                f.filter.clone().unwrap_or_default(),
            );
            *groups.entry(key).or_default() += 1;
        }
        for ((exposure, gain, filter), count) in groups {
            println!("    {exposure:>8}  gain {gain:<5} {filter:<8} x{count}");
        }
    }

    Ok(())
}
