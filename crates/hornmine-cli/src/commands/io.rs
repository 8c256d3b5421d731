//! Fact import

use std::path::PathBuf;

use clap::Args;
use hornmine_kb::load_facts;

use crate::{AppContext, Cli};

#[derive(Args)]
pub struct ImportArgs {
    /// Input file: one `subject<TAB>predicate<TAB>object` fact per line
    pub file: PathBuf,
}

pub fn run_import(args: &ImportArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Importing from {:?}", args.file);

    let facts = load_facts(&args.file)?;
    let inserted = ctx.kb.insert_facts(&facts)?;
    let total = ctx.kb.len()?;

    tracing::info!("Imported {} new facts ({} total)", inserted, total);
    println!(
        "Imported {} facts ({} new) from {}",
        facts.len(),
        inserted,
        args.file.display()
    );
    println!("Knowledge base now holds {} facts", total);
    Ok(())
}
