use anyhow::{Context, Result};
use std::path::Path;

use extract::{FewShotExample, PromptTemplate, TwoStageTemplates};

async fn read_required(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    tokio::fs::read_to_string(&path)
        .await
        .context(format!("Failed to read prompt file: {:?}", path))
}

async fn read_optional(dir: &Path, name: &str) -> Option<String> {
    tokio::fs::read_to_string(dir.join(name)).await.ok()
}

/// Load the single-stage template from a prompt directory: `system.txt`
/// (required), `ontology.txt` (required in ontology mode), and an optional
/// `fewshot-user.txt`/`fewshot-assistant.txt` pair.
pub async fn load_template(dir: &Path, with_ontology: bool) -> Result<PromptTemplate> {
    let system = read_required(dir, "system.txt").await?;
    let mut template = PromptTemplate::new(system);

    if with_ontology {
        template = template.with_ontology(read_required(dir, "ontology.txt").await?);
    }

    let few_shot = match (
        read_optional(dir, "fewshot-user.txt").await,
        read_optional(dir, "fewshot-assistant.txt").await,
    ) {
        (Some(prompt), Some(response)) => vec![FewShotExample { prompt, response }],
        (None, None) => Vec::new(),
        _ => anyhow::bail!(
            "fewshot-user.txt and fewshot-assistant.txt must be supplied together"
        ),
    };

    Ok(template.with_few_shot(few_shot))
}

/// Load the two-stage system prompts: `stage1-system.txt` and
/// `stage2-system.txt`.
pub async fn load_two_stage(dir: &Path) -> Result<TwoStageTemplates> {
    Ok(TwoStageTemplates {
        stage1: PromptTemplate::new(read_required(dir, "stage1-system.txt").await?),
        stage2: PromptTemplate::new(read_required(dir, "stage2-system.txt").await?),
    })
}
