//! Agent definitions: a role, a goal and a persona, optionally bound to a tool.

use crate::llm::Message;
use crate::tools::Tool;

/// Immutable agent record shared by every run.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// Identifier steps refer to.
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tool: Option<Tool>,
}

impl Agent {
    /// Persona text used as the system prompt.
    pub fn persona(&self) -> String {
        let mut text = format!(
            "You are the {}.\n\nYour goal: {}\n\nBackground: {}",
            self.role, self.goal, self.backstory
        );
        if let Some(tool) = self.tool {
            text.push_str(&format!(
                "\n\nYou work from the {} reference template included with each task.",
                tool.display_name()
            ));
        }
        text.push_str("\n\nRespond with the finished deliverable in Markdown only.");
        text
    }

    pub fn system_message(&self) -> Message {
        Message::system(self.persona())
    }
}
