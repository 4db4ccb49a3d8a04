//! One streaming generation call with progress reporting.

use crate::llm::{GenerationClient, LlmError};
use crate::task::TaskReporter;

/// Progress shape of one generation call.
///
/// Progress is a pure function of the characters received so far:
/// `min(ceiling, base + chars / chars_per_point)`. An update is written each
/// time the accumulated length crosses a multiple of `report_every`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    /// Status line prefix; the running character count is appended.
    pub label: &'static str,
    pub base: u8,
    pub ceiling: u8,
    pub chars_per_point: usize,
    pub report_every: usize,
}

impl Phase {
    pub fn progress_at(&self, chars: usize) -> u8 {
        let gained = chars / self.chars_per_point.max(1);
        let value = (self.base as usize).saturating_add(gained);
        value.min(self.ceiling as usize) as u8
    }

    /// Run one generation call for `prompt`, reporting progress on `reporter`.
    pub async fn generate(
        &self,
        client: &dyn GenerationClient,
        reporter: &TaskReporter,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let report_every = self.report_every.max(1);
        let mut counted_bytes = 0;
        let mut chars = 0;
        let mut last_mark = 0;

        client
            .generate_streaming(prompt, &mut |text: &str| {
                // Fragments always end on a char boundary, so the unseen tail
                // starts exactly where the last count stopped.
                chars += text[counted_bytes..].chars().count();
                counted_bytes = text.len();

                let mark = chars / report_every;
                if mark > last_mark {
                    last_mark = mark;
                    reporter.progress(
                        format!("{} ({} chars)", self.label, chars),
                        self.progress_at(chars),
                    );
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::pipeline::testing::reporter;
    use crate::task::TaskKind;

    const DRAFT: Phase = Phase {
        label: "Drafting...",
        base: 10,
        ceiling: 40,
        chars_per_point: 500,
        report_every: 1000,
    };

    #[test]
    fn test_progress_is_capped() {
        assert_eq!(DRAFT.progress_at(0), 10);
        assert_eq!(DRAFT.progress_at(2_500), 15);
        assert_eq!(DRAFT.progress_at(14_999), 39);
        assert_eq!(DRAFT.progress_at(1_000_000), 40);
    }

    #[tokio::test]
    async fn test_reports_when_crossing_boundaries() {
        let (reporter, store) = reporter(TaskKind::ScriptRewrite);
        let client = ScriptedClient::new().respond("\u{e9}".repeat(2_500));

        let text = DRAFT.generate(&client, &reporter, "prompt").await.unwrap();
        assert_eq!(text.chars().count(), 2_500);

        let task = store.get(&reporter.id()).unwrap();
        // Last boundary crossed was 2000 chars, counted in characters not bytes.
        assert!(task.message().starts_with("Drafting... ("));
        assert!(task.message().ends_with(" chars)"));
        let reported: usize = task
            .message()
            .trim_start_matches("Drafting... (")
            .trim_end_matches(" chars)")
            .parse()
            .unwrap();
        assert!((2_000..2_100).contains(&reported));
        assert_eq!(task.progress(), DRAFT.progress_at(reported));
    }
}
