use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use caldera_core::combine::sigma_clip::{ClipEstimator, SigmaClipParams};
use caldera_core::combine::{CombineMethod, RejectionMethod};
use caldera_core::consts::EXPOSURE_TOLERANCE;
use caldera_core::frame::FrameKind;
use caldera_core::io::image_io::save_preview_png;
use caldera_core::master::{combine_reported, CombinationRequest, MetadataOverrides};
use caldera_core::source::FrameSource;
use clap::{Args, ValueEnum};

use super::{Context, KindArg};
use crate::progress::BarReporter;
use crate::summary::print_master_summary;

#[derive(Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Median,
    Average,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RejectionArg {
    None,
    Minmax,
    SigmaClip,
}

#[derive(Args)]
pub struct CombineArgs {
    /// Calibration session name
    pub session: String,

    /// Kind of frames to combine
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Combination method (default from config)
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Outlier rejection (default from config)
    #[arg(long, value_enum)]
    pub rejection: Option<RejectionArg>,

    /// Sigma threshold for sigma-clip rejection
    #[arg(long)]
    pub sigma: Option<f32>,

    /// Maximum sigma-clip passes
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Clip around the median using the MAD instead of mean/stddev
    #[arg(long)]
    pub mad: bool,

    /// Only use frames with this exposure time (seconds)
    #[arg(long)]
    pub only_exposure: Option<f64>,

    /// Only use flats taken through this filter
    #[arg(long)]
    pub only_filter: Option<String>,

    /// Exposure time to stamp on the master
    #[arg(long)]
    pub exposure: Option<f64>,

    /// Gain to stamp on the master
    #[arg(long)]
    pub gain: Option<i32>,

    /// Filter to stamp on the master (flats only)
    #[arg(long)]
    pub filter: Option<String>,

    /// Also write an 8-bit PNG preview of the master
    #[arg(long)]
    pub preview: Option<PathBuf>,
}

pub fn run(args: &CombineArgs, ctx: &Context) -> Result<()> {
    let kind = FrameKind::from(args.kind);
    let mut frames = ctx.source().frames(&args.session, kind)?;
    if let Some(t) = args.only_exposure {
        frames.retain(|f| (f.exposure_time - t).abs() <= EXPOSURE_TOLERANCE);
    }
    if let Some(ref filter) = args.only_filter {
        frames.retain(|f| f.filter.as_deref() == Some(filter.as_str()));
    }
    if frames.is_empty() {
        bail!("No {} frames selected in session {}", kind, args.session);
    }

    let request = CombinationRequest::new(&args.session, kind, frames)
        .with_method(method(args, ctx))
        .with_rejection(rejection(args, ctx))
        .with_overrides(MetadataOverrides {
            exposure_time: args.exposure,
            gain: args.gain,
            filter: args.filter.clone(),
        });

    println!(
        "Combining {} {} frames ({}, rejection {})",
        request.frames.len(),
        kind,
        request.method,
        request.rejection
    );

    let store = ctx.store();
    let reporter = BarReporter::new();
    let master = combine_reported(&request, &store, &reporter)
        .with_context(|| format!("Failed to combine {} frames", kind))?;
    reporter.finish();

    let path = store.master_file(&master.record);
    print_master_summary(&master.record, &path);

    if let Some(ref preview) = args.preview {
        save_preview_png(&master.data, preview)
            .with_context(|| format!("Failed to write preview {}", preview.display()))?;
        println!("Preview saved to {}", preview.display());
    }

    Ok(())
}

fn method(args: &CombineArgs, ctx: &Context) -> CombineMethod {
    match args.method {
        Some(MethodArg::Median) => CombineMethod::Median,
        Some(MethodArg::Average) => CombineMethod::Average,
        None => ctx.config.combine.method,
    }
}

fn rejection(args: &CombineArgs, ctx: &Context) -> RejectionMethod {
    let configured = ctx.config.combine.rejection;
    let base = match args.rejection {
        Some(RejectionArg::None) => return RejectionMethod::None,
        Some(RejectionArg::Minmax) => return RejectionMethod::MinMax,
        Some(RejectionArg::SigmaClip) => match configured {
            RejectionMethod::SigmaClip(p) => p,
            _ => SigmaClipParams::default(),
        },
        None => match configured {
            RejectionMethod::SigmaClip(p) => p,
            other => return other,
        },
    };

    RejectionMethod::SigmaClip(SigmaClipParams {
        sigma: args.sigma.unwrap_or(base.sigma),
        max_iterations: args.iterations.unwrap_or(base.max_iterations),
        estimator: if args.mad {
            ClipEstimator::MedianMad
        } else {
            base.estimator
        },
    })
}
