use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use caldera_core::characterize::{characterize_reported, CharacterizationRequest};
use caldera_core::frame::{FrameDescriptor, FrameKind};
use caldera_core::source::FrameSource;
use clap::Args;

use super::Context;
use crate::progress::BarReporter;
use crate::summary::print_profile_summary;

#[derive(Args)]
pub struct CharacterizeArgs {
    /// Calibration session name
    pub session: String,

    /// Camera model the profile is recorded for
    #[arg(long)]
    pub camera: String,

    /// Camera gain setting used for the frames
    #[arg(long)]
    pub gain_setting: Option<i32>,

    /// Camera offset setting used for the frames
    #[arg(long)]
    pub offset: Option<i32>,

    /// Binning mode, e.g. 2x2
    #[arg(long)]
    pub binning: Option<String>,

    /// Sensor temperature in degrees Celsius
    #[arg(long, allow_negative_numbers = true)]
    pub temperature: Option<f64>,

    /// Two bias frames (default: first two scanned bias frames)
    #[arg(long, num_args = 2, value_names = ["BIAS1", "BIAS2"])]
    pub bias: Option<Vec<PathBuf>>,

    /// Two flat frames (default: first two scanned flat frames)
    #[arg(long, num_args = 2, value_names = ["FLAT1", "FLAT2"])]
    pub flats: Option<Vec<PathBuf>>,
}

pub fn run(args: &CharacterizeArgs, ctx: &Context) -> Result<()> {
    let bias = pair(args.bias.as_deref(), FrameKind::Bias, args, ctx)?;
    let flats = pair(args.flats.as_deref(), FrameKind::Flat, args, ctx)?;

    let request = CharacterizationRequest {
        session: args.session.clone(),
        camera_model: args.camera.clone(),
        gain_setting: args.gain_setting,
        offset: args.offset,
        binning: args.binning.clone(),
        temperature: args.temperature,
        bias,
        flats,
    };

    println!("Characterizing {} ({})", args.camera, args.session);
    let store = ctx.store();
    let reporter = BarReporter::new();
    let profile = characterize_reported(&request, &store, &ctx.config.characterize, &reporter)
        .context("Sensor characterization failed")?;
    reporter.finish();

    let path = store.layout().profile_path(
        &profile.session,
        &profile.camera_model,
        profile.gain_setting,
    );
    print_profile_summary(&profile, &path);
    Ok(())
}

fn pair(
    paths: Option<&[PathBuf]>,
    kind: FrameKind,
    args: &CharacterizeArgs,
    ctx: &Context,
) -> Result<[FrameDescriptor; 2]> {
    let descriptors = match paths {
        Some(paths) => paths
            .iter()
            .map(|p| FrameDescriptor::new(p, kind, 0.0, args.gain_setting, None))
            .collect(),
        None => ctx.source().frames(&args.session, kind)?,
    };

    match <[FrameDescriptor; 2]>::try_from(descriptors.into_iter().take(2).collect::<Vec<_>>()) {
        Ok(pair) => Ok(pair),
        Err(found) => bail!(
            "Need two {} frames in session {}, found {}",
            kind,
            args.session,
            found.len()
        ),
    }
}
