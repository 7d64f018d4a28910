use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use ticket_flow::cli::commands::{
    self, actions::ActionsCommand, check::CheckCommand, export::ExportCommand,
    graph::GraphCommand, resolve::ResolveCommand, rules::RulesCommand,
};
use ticket_flow::cli::{Cli, Commands};
use ticket_flow::config::config;
use ticket_flow::rules::RuleQuery;
use ticket_flow::telemetry::init_telemetry;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(run(cli)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {err:#}");
            ExitCode::from(commands::exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config()?;
    init_telemetry(&settings.observability)?;

    let definition_path = cli
        .definition
        .clone()
        .or_else(|| settings.workflow.definition_path.clone());
    let loaded = commands::load_workflow(definition_path.as_deref(), &settings.cache).await?;
    let engine = &loaded.engine;

    match cli.command {
        Commands::Check => CheckCommand::new().with_json(cli.json).execute(engine).await,
        Commands::Resolve {
            status,
            action,
            ticket_type,
        } => {
            ResolveCommand::new(status, action, ticket_type)
                .with_json(cli.json)
                .execute(engine)
                .await
        }
        Commands::Actions {
            status,
            ticket_type,
        } => {
            ActionsCommand::new(status, ticket_type)
                .with_json(cli.json)
                .execute(engine)
                .await
        }
        Commands::Rules {
            ticket_type,
            from_status,
            active_only,
        } => {
            let query = RuleQuery {
                ticket_type,
                from_status,
                active_only,
            };
            RulesCommand::new(query).with_json(cli.json).execute(engine).await
        }
        Commands::Graph { ticket_type } => {
            GraphCommand::new(ticket_type)
                .with_json(cli.json)
                .execute(engine)
                .await
        }
        Commands::Export => ExportCommand::new(&loaded.definition).execute(),
    }
}
