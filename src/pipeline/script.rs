//! Script rewrite toward a target character count.
//!
//! Up to three calls: a full rewrite, a length adjustment when the draft
//! lands outside the target window, and a minimal-edit fine-tune when the
//! adjustment still misses it.

use crate::llm::GenerationClient;
use crate::task::TaskReporter;

use super::{char_count, Outcome, Phase};

/// Deviation beyond which the adjustment asks for a substantial rewrite.
const MAJOR_DEVIATION_PERCENT: f64 = 20.0;

const DRAFT: Phase = Phase {
    label: "Step 1/3: Creating initial rewrite...",
    base: 10,
    ceiling: 40,
    chars_per_point: 500,
    report_every: 1000,
};

const ADJUST: Phase = Phase {
    label: "Step 2/3: Adjusting length...",
    base: 50,
    ceiling: 70,
    chars_per_point: 1000,
    report_every: 1000,
};

const FINE_TUNE: Phase = Phase {
    label: "Step 3/3: Fine-tuning...",
    base: 80,
    ceiling: 95,
    chars_per_point: 3000,
    report_every: 1000,
};

/// Accepted lengths around a target: `floor(0.95 * t) ..= floor(1.05 * t)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetWindow {
    pub target: usize,
    pub min: usize,
    pub max: usize,
}

impl TargetWindow {
    pub fn around(target: usize) -> Self {
        Self {
            target,
            min: target.saturating_mul(95) / 100,
            max: target.saturating_mul(105) / 100,
        }
    }

    pub fn contains(&self, chars: usize) -> bool {
        (self.min..=self.max).contains(&chars)
    }

    /// Signed deviation from the target, in percent.
    pub fn deviation_percent(&self, chars: usize) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        (chars as f64 - self.target as f64) / self.target as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Expand,
    Reduce,
}

impl Direction {
    fn of(chars: usize, target: usize) -> Self {
        if chars < target {
            Direction::Expand
        } else {
            Direction::Reduce
        }
    }
}

pub async fn rewrite(
    client: &dyn GenerationClient,
    reporter: &TaskReporter,
    script: &str,
    target_chars: usize,
) -> anyhow::Result<Outcome> {
    let window = TargetWindow::around(target_chars);
    reporter.progress("Starting rewrite process...", 0);

    reporter.progress(DRAFT.label, DRAFT.base);
    let draft = DRAFT
        .generate(client, reporter, &rewrite_prompt(script))
        .await?;
    let draft_chars = char_count(&draft);
    tracing::debug!(task_id = %reporter.id(), draft_chars, target_chars, "Initial rewrite finished");

    let adjusted = if window.contains(draft_chars) {
        reporter.progress(
            "Initial rewrite is within target range. Skipping to final adjustments...",
            70,
        );
        draft
    } else {
        let deviation = window.deviation_percent(draft_chars);
        let severity = if deviation.abs() > MAJOR_DEVIATION_PERCENT {
            "Major"
        } else {
            "Minor"
        };
        reporter.progress(
            format!(
                "Step 2/3: {} length adjustment needed ({:.1}% {} than target)",
                severity,
                deviation.abs(),
                if deviation > 0.0 { "longer" } else { "shorter" }
            ),
            ADJUST.base,
        );
        ADJUST
            .generate(
                client,
                reporter,
                &adjustment_prompt(&draft, draft_chars, &window),
            )
            .await?
    };

    let adjusted_chars = char_count(&adjusted);
    let final_text = if window.contains(adjusted_chars) {
        adjusted
    } else {
        reporter.progress(
            format!(
                "Step 3/3: Fine-tuning length ({} chars vs target {})",
                adjusted_chars, target_chars
            ),
            FINE_TUNE.base,
        );
        FINE_TUNE
            .generate(
                client,
                reporter,
                &fine_tune_prompt(&adjusted, adjusted_chars, target_chars),
            )
            .await?
    };

    let final_chars = char_count(&final_text);
    Ok(Outcome {
        message: "Rewriting completed successfully!".to_string(),
        text: format!(
            "Character count: {}/Target: {}\n\n{}",
            final_chars, target_chars, final_text
        ),
    })
}

fn rewrite_prompt(script: &str) -> String {
    format!(
        "Rewrite the following script completely so that none of its identifiable details \
         remain, while keeping the same structure, plot and emotional impact.\n\
         \n\
         Guidelines:\n\
         1. FULL REPHRASING: reword every sentence with new structure and vocabulary.\n\
         2. NEW DETAILS: change names, places, jobs, ages, dates and examples.\n\
         3. REDDIT STYLE: casual first-person storytelling, as if posted on Reddit.\n\
         4. SAME SHAPE: keep the pacing, plot and key emotional beats.\n\
         \n\
         Script:\n\
         \n\
         {script}\n"
    )
}

fn adjustment_prompt(draft: &str, draft_chars: usize, window: &TargetWindow) -> String {
    let deviation = window.deviation_percent(draft_chars).abs();
    let degree = if deviation > MAJOR_DEVIATION_PERCENT {
        "significantly"
    } else {
        "slightly"
    };
    let target = window.target;

    match Direction::of(draft_chars, target) {
        Direction::Expand => format!(
            "This Reddit-style story is {degree} shorter than needed. Expand it from \
             {draft_chars} characters to approximately {target} characters.\n\
             \n\
             Story:\n\
             \n\
             {draft}\n\
             \n\
             Add detail, reactions or supporting moments in the same style and flow. \
             Do not change the plot or structure; flesh out what is already there.\n"
        ),
        Direction::Reduce => format!(
            "This Reddit-style story is {degree} longer than needed. Shorten it from \
             {draft_chars} characters to approximately {target} characters.\n\
             \n\
             Story:\n\
             \n\
             {draft}\n\
             \n\
             Keep every key plot point, character beat and emotional moment. Tighten the \
             language and drop unnecessary detail instead.\n"
        ),
    }
}

fn fine_tune_prompt(text: &str, chars: usize, target: usize) -> String {
    let verb = match Direction::of(chars, target) {
        Direction::Expand => "expand",
        Direction::Reduce => "trim",
    };
    format!(
        "This Reddit-style story needs a precise length adjustment. Please {verb} it from \
         {chars} characters to approximately {target} characters.\n\
         \n\
         Story:\n\
         \n\
         {text}\n\
         \n\
         Make minimal changes and keep the story exactly as it is otherwise. When expanding, \
         add a little detail or descriptive language. When trimming, remove unnecessary \
         words without changing any content.\n"
    )
}
