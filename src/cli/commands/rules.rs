use anyhow::Result;

use super::print_json;
use crate::engine::TransitionEngine;
use crate::rules::RuleQuery;
use crate::store::TransitionStore;

pub struct RulesCommand {
    pub query: RuleQuery,
    pub json: bool,
}

impl RulesCommand {
    pub fn new(query: RuleQuery) -> Self {
        Self { query, json: false }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute<S: TransitionStore>(&self, engine: &TransitionEngine<S>) -> Result<()> {
        let rules = engine.admin().list(&self.query).await?;

        if self.json {
            return print_json(&rules);
        }

        println!(
            "{:<14} {:<14} {:<14} {:<14} ACTIVE",
            "TICKET_TYPE", "FROM", "ACTION", "TO"
        );
        for rule in &rules {
            println!(
                "{:<14} {:<14} {:<14} {:<14} {}",
                rule.ticket_type.as_str(),
                rule.from_status.as_str(),
                rule.action.as_str(),
                rule.to_status.as_str(),
                if rule.is_active { "yes" } else { "no" }
            );
        }
        println!();
        println!("{} rule(s)", rules.len());
        Ok(())
    }
}
