use anyhow::Result;

use super::print_json;
use crate::engine::TransitionEngine;
use crate::store::TransitionStore;

pub struct ActionsCommand {
    pub status: String,
    pub ticket_type: String,
    pub json: bool,
}

impl ActionsCommand {
    pub fn new(status: String, ticket_type: String) -> Self {
        Self {
            status,
            ticket_type,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute<S: TransitionStore>(&self, engine: &TransitionEngine<S>) -> Result<()> {
        let actions = engine
            .list_applicable_actions(&self.status, &self.ticket_type)
            .await?;

        if self.json {
            return print_json(&actions);
        }

        if actions.is_empty() {
            println!("No actions available from {} for {}", self.status, self.ticket_type);
            return Ok(());
        }
        for action in actions {
            println!("{action}");
        }
        Ok(())
    }
}
