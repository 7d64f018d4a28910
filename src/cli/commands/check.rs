use anyhow::Result;
use serde::Serialize;

use super::print_json;
use crate::catalog::Code;
use crate::engine::TransitionEngine;
use crate::rules::RuleQuery;
use crate::store::TransitionStore;

/// Summary of a loaded workflow, with the statuses tickets can get stuck in
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub statuses: usize,
    pub actions: usize,
    pub ticket_types: usize,
    pub rules: usize,
    pub dead_ends: Vec<DeadEnd>,
}

#[derive(Debug, Serialize)]
pub struct DeadEnd {
    pub ticket_type: Code,
    pub status: Code,
}

pub struct CheckCommand {
    pub json: bool,
}

impl CheckCommand {
    pub fn new() -> Self {
        Self { json: false }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn report<S: TransitionStore>(engine: &TransitionEngine<S>) -> Result<CheckReport> {
        let ticket_types = engine.ticket_types().list(true).await?;
        let mut dead_ends = Vec::new();
        for ticket_type in &ticket_types {
            let graph = engine.lifecycle_graph(ticket_type.code.as_str()).await?;
            dead_ends.extend(graph.dead_ends().into_iter().map(|status| DeadEnd {
                ticket_type: ticket_type.code.clone(),
                status: status.clone(),
            }));
        }

        Ok(CheckReport {
            statuses: engine.statuses().list(false).await?.len(),
            actions: engine.actions().list(false).await?.len(),
            ticket_types: ticket_types.len(),
            rules: engine.admin().list(&RuleQuery::default()).await?.len(),
            dead_ends,
        })
    }

    pub async fn execute<S: TransitionStore>(&self, engine: &TransitionEngine<S>) -> Result<()> {
        let report = Self::report(engine).await?;
        if self.json {
            return print_json(&report);
        }

        println!(
            "✅ Workflow loaded: {} statuses, {} actions, {} ticket types, {} rules",
            report.statuses, report.actions, report.ticket_types, report.rules
        );
        for dead_end in &report.dead_ends {
            println!(
                "⚠️  {}: status {} has no outgoing transition and is not terminal",
                dead_end.ticket_type, dead_end.status
            );
        }
        Ok(())
    }
}

impl Default for CheckCommand {
    fn default() -> Self {
        Self::new()
    }
}
