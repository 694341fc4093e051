use anyhow::Result;
use clap::Args;

use super::Context;
use crate::summary::print_profile_table;

#[derive(Args)]
pub struct ProfilesArgs {
    /// Calibration session name
    pub session: String,

    /// Print profiles as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &ProfilesArgs, ctx: &Context) -> Result<()> {
    let profiles = ctx.store().list_profiles(&args.session)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
    } else {
        print_profile_table(&profiles);
    }
    Ok(())
}
