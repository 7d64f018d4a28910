use anyhow::Result;

use crate::definition::WorkflowDefinition;

pub struct ExportCommand<'a> {
    pub definition: &'a WorkflowDefinition,
}

impl<'a> ExportCommand<'a> {
    pub fn new(definition: &'a WorkflowDefinition) -> Self {
        Self { definition }
    }

    pub fn execute(&self) -> Result<()> {
        print!("{}", self.definition.to_toml_string()?);
        Ok(())
    }
}
