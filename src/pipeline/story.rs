//! Story generation with a minimum word count.

use std::sync::OnceLock;

use regex::Regex;

use crate::llm::GenerationClient;
use crate::task::TaskReporter;

use super::{Outcome, Phase};

const DRAFT: Phase = Phase {
    label: "Step 1/2: Creating initial story...",
    base: 10,
    ceiling: 50,
    chars_per_point: 500,
    report_every: 1000,
};

const EXPAND: Phase = Phase {
    label: "Step 2/2: Expanding story...",
    base: 60,
    ceiling: 90,
    chars_per_point: 1000,
    report_every: 1000,
};

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^Title:.*$\s*^Text:").expect("valid header regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word regex"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Title:[ \t]*(.*?)\s*$").expect("valid title regex"))
}

/// Remove the first `Title:` line and its `Text:` marker, trimming the rest.
pub fn strip_story_header(story: &str) -> String {
    header_re().replace(story, "").trim().to_string()
}

/// Count of word-character runs in the story body, header excluded.
pub fn word_count(story: &str) -> usize {
    word_re().find_iter(&strip_story_header(story)).count()
}

/// The text after the first `Title:` marker, if any and non-empty.
pub fn story_title(story: &str) -> Option<String> {
    title_re()
        .captures(story)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|title| !title.is_empty())
}

pub async fn generate(
    client: &dyn GenerationClient,
    reporter: &TaskReporter,
    plot_ideas: &str,
    min_words: usize,
) -> anyhow::Result<Outcome> {
    reporter.progress("Starting story generation...", 0);

    reporter.progress(DRAFT.label, DRAFT.base);
    let draft = DRAFT
        .generate(client, reporter, &story_prompt(plot_ideas, min_words))
        .await?;
    let draft_words = word_count(&draft);
    tracing::debug!(task_id = %reporter.id(), draft_words, min_words, "Story draft finished");

    let (story, words) = if draft_words < min_words {
        reporter.progress(
            format!(
                "Step 2/2: Story is {} words, expanding to reach {} words...",
                draft_words, min_words
            ),
            EXPAND.base,
        );
        let expanded = EXPAND
            .generate(
                client,
                reporter,
                &expansion_prompt(&draft, draft_words, min_words),
            )
            .await?;
        let expanded_words = word_count(&expanded);
        if expanded_words > draft_words {
            (expanded, expanded_words)
        } else {
            tracing::info!(
                task_id = %reporter.id(),
                draft_words,
                expanded_words,
                "Expansion did not add words, keeping the draft"
            );
            (draft, draft_words)
        }
    } else {
        (draft, draft_words)
    };

    Ok(Outcome {
        message: format!(
            "Story generation completed successfully! Word count: {}",
            words
        ),
        text: story,
    })
}

fn story_prompt(plot_ideas: &str, min_words: usize) -> String {
    format!(
        "Turn the plot outline below into a complete Reddit-style story of at least \
         {min_words} words.\n\
         \n\
         Guidelines:\n\
         1. VOICE: casual first-person storytelling, as if shared on Reddit.\n\
         2. TONE: everyday conversational language, no novel-like prose.\n\
         3. CHARACTERS: realistic and consistent; first names or nicknames only, never full names.\n\
         4. DIALOGUE: minimal, natural and never cheesy.\n\
         5. PACING: build tension and emotional resonance toward the ending.\n\
         6. LENGTH: at least {min_words} words.\n\
         7. TITLE: a casual, attention-catching title like a real Reddit post.\n\
         \n\
         Plot outline:\n\
         {plot_ideas}\n\
         \n\
         Write a complete story with a beginning, middle and satisfying conclusion, told as \
         if to a friend. Keep the tone consistent throughout. Format the response with a \
         \"Title:\" line followed by a \"Text:\" section.\n"
    )
}

fn expansion_prompt(story: &str, words: usize, min_words: usize) -> String {
    let missing = min_words.saturating_sub(words);
    format!(
        "This Reddit-style story has {words} words but needs at least {min_words} \
         (about {missing} more).\n\
         \n\
         Current story:\n\
         \n\
         {story}\n\
         \n\
         Expand it with more of the narrator's inner thoughts, more detail on key events, \
         fuller reactions and emotions, and small supporting scenes where they help the \
         main plot. Keep the casual tone, first names only and minimal dialogue. Do not \
         change existing plot points. Keep the same \"Title:\" and \"Text:\" format.\n"
    )
}
