use anyhow::Result;

use super::print_json;
use crate::engine::TransitionEngine;
use crate::store::TransitionStore;

pub struct GraphCommand {
    pub ticket_type: String,
    pub json: bool,
}

impl GraphCommand {
    pub fn new(ticket_type: String) -> Self {
        Self {
            ticket_type,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute<S: TransitionStore>(&self, engine: &TransitionEngine<S>) -> Result<()> {
        let graph = engine.lifecycle_graph(&self.ticket_type).await?;
        if self.json {
            return print_json(&graph);
        }
        print!("{graph}");
        Ok(())
    }
}
