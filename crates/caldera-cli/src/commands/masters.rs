use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::Context;
use crate::summary::print_master_table;

#[derive(Subcommand)]
pub enum MastersCommand {
    /// List recorded master frames
    List(ListArgs),
    /// Delete one master frame record
    Delete(DeleteArgs),
    /// Delete every master frame record of a session
    Purge(PurgeArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Only list masters of this session
    #[arg(long)]
    pub session: Option<String>,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Master id
    pub id: Uuid,

    /// Also remove the FITS file when no other record uses it
    #[arg(long)]
    pub delete_file: bool,
}

#[derive(Args)]
pub struct PurgeArgs {
    /// Calibration session name
    pub session: String,

    /// Also remove the FITS files
    #[arg(long)]
    pub delete_files: bool,
}

pub fn run(command: &MastersCommand, ctx: &Context) -> Result<()> {
    let store = ctx.store();
    match command {
        MastersCommand::List(args) => {
            let masters = store.list_masters(args.session.as_deref())?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&masters)?);
            } else {
                print_master_table(&masters);
            }
        }
        MastersCommand::Delete(args) => {
            let removed = store
                .delete_master(args.id, args.delete_file)
                .with_context(|| format!("Failed to delete master {}", args.id))?;
            println!("Deleted {} ({})", removed.filename, removed.session);
        }
        MastersCommand::Purge(args) => {
            let count = store.delete_session_masters(&args.session, args.delete_files)?;
            println!("Deleted {} master(s) from {}", count, args.session);
        }
    }
    Ok(())
}
