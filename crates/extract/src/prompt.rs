use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;
use crate::schema::Entity;

/// One worked example, replayed as a user/assistant exchange ahead of the
/// real input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotExample {
    /// User message content for the example
    pub prompt: String,
    /// Assistant message content (expected JSON string)
    pub response: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub ontology_description: Option<String>,
    pub few_shot: Vec<FewShotExample>,
}

impl PromptTemplate {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ontology_description: None,
            few_shot: Vec::new(),
        }
    }

    pub fn with_ontology(mut self, description: impl Into<String>) -> Self {
        self.ontology_description = Some(description.into());
        self
    }

    pub fn with_few_shot(mut self, examples: Vec<FewShotExample>) -> Self {
        self.few_shot = examples;
        self
    }

    /// Assemble the full message sequence for one extraction call: system
    /// instruction (plus ontology description when configured), few-shot
    /// exchanges, then the input text as the final user turn.
    pub fn build_messages(&self, text: &str) -> Vec<ChatMessage> {
        let system = match &self.ontology_description {
            Some(ontology) => format!("{}\n\n{}", self.system_prompt, ontology),
            None => self.system_prompt.clone(),
        };

        let mut messages = vec![ChatMessage::system(system)];
        for example in &self.few_shot {
            messages.push(ChatMessage::user(example.prompt.clone()));
            messages.push(ChatMessage::assistant(example.response.clone()));
        }
        messages.push(ChatMessage::user(text));

        messages
    }
}

/// System prompts for the two-stage strategy: stage 1 lists entities,
/// stage 2 turns an entity inventory plus the text into triplets.
#[derive(Debug, Clone)]
pub struct TwoStageTemplates {
    pub stage1: PromptTemplate,
    pub stage2: PromptTemplate,
}

/// Render stage-1 entities as the inventory block prepended to the stage-2
/// user turn.
pub fn build_stage2_input(entities: &[Entity], text: &str) -> String {
    let inventory: Vec<String> = entities
        .iter()
        .map(|entity| format!("- {} {}", entity.class, entity.name))
        .collect();
    format!("Entities:\n{}\n--\n{}", inventory.join("\n"), text)
}
