use anyhow::Result;

use super::print_json;
use crate::engine::TransitionEngine;
use crate::store::TransitionStore;

pub struct ResolveCommand {
    pub status: String,
    pub action: String,
    pub ticket_type: String,
    pub json: bool,
}

impl ResolveCommand {
    pub fn new(status: String, action: String, ticket_type: String) -> Self {
        Self {
            status,
            action,
            ticket_type,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute<S: TransitionStore>(&self, engine: &TransitionEngine<S>) -> Result<()> {
        let resolution = engine
            .resolve_transition(&self.status, &self.action, &self.ticket_type)
            .await?;

        if self.json {
            return print_json(&resolution);
        }

        println!(
            "{} --{}--> {}",
            resolution.from_status, resolution.action, resolution.to_status
        );
        if !resolution.description.is_empty() {
            println!("  {}", resolution.description);
        }
        println!("  rule {}", resolution.rule_id);
        Ok(())
    }
}
