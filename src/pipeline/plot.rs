//! Single-call plot outline generation.

use crate::llm::GenerationClient;
use crate::task::TaskReporter;

use super::{Outcome, Phase};

const OUTLINE: Phase = Phase {
    label: "Generating plot...",
    base: 10,
    ceiling: 90,
    chars_per_point: 300,
    report_every: 500,
};

pub async fn generate(
    client: &dyn GenerationClient,
    reporter: &TaskReporter,
    prompt: &str,
    paragraphs: usize,
    progressions: usize,
) -> anyhow::Result<Outcome> {
    reporter.progress("Starting plot structure generation...", 0);
    reporter.progress("Generating structured plot outline...", OUTLINE.base);

    let outline = OUTLINE
        .generate(
            client,
            reporter,
            &outline_prompt(prompt, paragraphs, progressions),
        )
        .await?;

    Ok(Outcome {
        message: "Plot structure generation completed successfully!".to_string(),
        text: outline,
    })
}

fn outline_prompt(prompt: &str, paragraphs: usize, progressions: usize) -> String {
    let last_middle = paragraphs.saturating_sub(1).max(2);
    format!(
        "Turn the rough plot prompt below into a well-structured, detailed plot outline. \
         The outline must:\n\
         \n\
         1. Be divided into exactly {paragraphs} paragraphs.\n\
         2. Contain exactly {progressions} plot progressions per paragraph after paragraph 1.\n\
         3. Write each progression as a numbered \"but therefore\" beat.\n\
         4. Keep a casual, Reddit-style conversational tone.\n\
         5. Use first names or nicknames only, never last names.\n\
         6. Keep dialogue minimal and focus on action and inner thoughts.\n\
         7. Include realistic conflict and obstacles throughout.\n\
         8. Hold a coherent arc with a beginning, middle and satisfying resolution.\n\
         \n\
         Plot prompt:\n\
         \n\
         {prompt}\n\
         \n\
         Formatting:\n\
         - Paragraph 1 establishes the backstory and setup (Act One).\n\
         - Paragraphs 2-{last_middle} develop the story through numbered progressions.\n\
         - Each progression follows: Event/Action BUT obstacle/complication THEREFORE consequence/reaction.\n\
         - The final paragraph resolves the story.\n\
         - Number progressions as \"X. (Progression #X) Event BUT obstacle THEREFORE consequence\".\n\
         - Give every paragraph a bold title, e.g. **Paragraph 1 (Act One: The Setup)**.\n"
    )
}
