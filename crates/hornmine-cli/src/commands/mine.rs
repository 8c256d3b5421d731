//! Rule discovery and instantiation commands

use clap::Args;
use hornmine_core::{HornRule, Predicate, RuleKind};

use crate::output::{format_output, instantiations_table, rules_table};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct DiscoverArgs {
    /// Target relation
    pub predicate: String,

    /// Mine rules that identify pairs the relation does not hold for
    #[arg(long)]
    pub negative: bool,

    /// Maximum number of body atoms (1-6)
    #[arg(short = 'l', long)]
    pub max_rule_length: Option<usize>,
}

#[derive(Args)]
pub struct InstantiateArgs {
    /// Target relation
    pub predicate: String,

    /// Rule body such as `bornIn(subject,v0) & locatedIn(v0,object)`,
    /// optionally followed by `=> head(subject,object)`
    pub rule: String,

    /// Instantiate as a negative rule
    #[arg(long)]
    pub negative: bool,

    /// Maximum number of instantiations
    #[arg(short = 'n', long)]
    pub max_instantiations: Option<usize>,
}

fn kind(negative: bool) -> RuleKind {
    if negative {
        RuleKind::Negative
    } else {
        RuleKind::Positive
    }
}

pub async fn run_discover(args: &DiscoverArgs, cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    let predicate = Predicate::parse(args.predicate.as_str())?;
    if let Some(len) = args.max_rule_length {
        ctx.miner.set_max_rule_length(len)?;
    }

    let kind = kind(args.negative);
    tracing::info!("Discovering {} rules for {}", kind, predicate);
    let result = ctx.miner.discover_rules(&predicate, kind).await?;
    tracing::info!("Run {} produced {} rules", result.id, result.results.len());

    println!("{}", format_output(&result, cli.output_format(), rules_table));
    Ok(())
}

pub async fn run_instantiate(
    args: &InstantiateArgs,
    cli: &Cli,
    ctx: &mut AppContext,
) -> anyhow::Result<()> {
    let predicate = Predicate::parse(args.predicate.as_str())?;
    let rule = parse_rule(&predicate, &args.rule)?;
    if let Some(n) = args.max_instantiations {
        ctx.miner.set_max_instantiation_count(n);
    }

    let result = ctx
        .miner
        .instantiate_rule(&rule, &predicate, kind(args.negative))
        .await?;
    println!(
        "{}",
        format_output(&result, cli.output_format(), instantiations_table)
    );
    Ok(())
}

/// Accept either a bare body or a full rule whose head is `predicate`
fn parse_rule(predicate: &Predicate, text: &str) -> anyhow::Result<HornRule> {
    if !text.contains("=>") {
        return Ok(HornRule::parse_body(predicate.clone(), text)?);
    }
    let rule: HornRule = text.parse()?;
    if rule.head != *predicate {
        anyhow::bail!(
            "Rule head {} does not match target relation {}",
            rule.head,
            predicate
        );
    }
    Ok(rule)
}
