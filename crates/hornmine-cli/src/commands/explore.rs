//! Knowledge base exploration: relations, types and surrounding graphs

use clap::Args;
use hornmine_core::{Entity, Predicate};
use hornmine_kb::KnowledgeBase;

use crate::output::{format_output, graph_table};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct TypesArgs {
    /// Relation name
    pub predicate: String,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Seed entities
    #[arg(required = true)]
    pub entities: Vec<String>,
}

pub async fn run_relations(cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let relations = ctx.miner.list_relations().await?;
    tracing::info!("Found {} relations", relations.len());

    let out = format_output(&relations, cli.output_format(), |relations| {
        if relations.is_empty() {
            return "No relations found".to_string();
        }
        relations
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    });
    println!("{}", out);
    Ok(())
}

pub async fn run_types(args: &TypesArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let predicate = Predicate::parse(args.predicate.as_str())?;
    let Some(types) = ctx.kb.predicate_types(&predicate).await? else {
        anyhow::bail!("No subject/object types found for {}", predicate);
    };

    let out = format_output(&types, cli.output_format(), |types| {
        format!(
            "{}\n  subject: {}\n  object:  {}",
            predicate, types.subject, types.object
        )
    });
    println!("{}", out);
    Ok(())
}

pub async fn run_graph(args: &GraphArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let entities = args
        .entities
        .iter()
        .map(|e| Entity::parse(e.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let graph = ctx.miner.build_graph(entities).await?;
    println!("{}", format_output(&graph, cli.output_format(), graph_table));
    Ok(())
}
