//! Detection and repair of replies cut off mid-sentence
//!
//! The heuristics are tuned for mixed Chinese and English chat text and are
//! replaceable through [`TruncationPolicy`].

use parley_llm::types::FinishReason;

/// Instruction sent with the follow-up call
pub const CONTINUE_PROMPT: &str = "Your previous reply was cut off. Continue exactly from where you left off, \
                                   without repeating anything you already wrote.";

/// Shortest overlap trimmed when merging a continuation
const MIN_OVERLAP_CHARS: usize = 2;

/// Decides whether a reply needs one continuation call
pub trait TruncationPolicy: Send + Sync {
    fn needs_continuation(&self, text: &str, finish_reason: Option<FinishReason>) -> bool;

    fn continuation_prompt(&self) -> &str {
        CONTINUE_PROMPT
    }
}

/// Punctuation and connector-word heuristics
#[derive(Debug, Clone)]
pub struct HeuristicTruncation {
    /// Characters that end a sentence for good
    pub terminators: Vec<char>,
    /// Comma-like characters a finished reply does not end with
    pub dangling_marks: Vec<char>,
    /// Words a finished English sentence does not end with
    pub connectors: Vec<String>,
    /// Particles a finished Chinese sentence does not end with
    pub particles: Vec<String>,
}

impl Default for HeuristicTruncation {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_owned()).collect();

        Self {
            terminators: vec![
                '.', '!', '?', '。', '！', '？', '…', '~', '～', '"', '\'', '”', '’', '」', '』', ')', '）', '*', '】',
            ],
            dangling_marks: vec![',', '，', '、', ';', '；', ':', '：', '-', '—', '(', '（', '“', '「', '『'],
            connectors: words(&[
                "a", "an", "and", "are", "as", "at", "because", "but", "by", "for", "from", "if", "in", "is", "my", "of",
                "on", "or", "so", "than", "that", "the", "then", "to", "was", "were", "when", "which", "while", "with",
                "your",
            ]),
            particles: words(&[
                "的", "地", "得", "和", "与", "跟", "或", "但", "而", "因为", "所以", "然后", "就", "在", "是", "把",
                "被", "让", "给", "还", "也", "都", "又", "如果", "虽然", "可是", "并且",
            ]),
        }
    }
}

impl TruncationPolicy for HeuristicTruncation {
    fn needs_continuation(&self, text: &str, finish_reason: Option<FinishReason>) -> bool {
        if finish_reason == Some(FinishReason::Length) {
            return true;
        }

        let text = text.trim_end();
        let Some(last) = text.chars().last() else {
            return false;
        };

        if self.terminators.contains(&last) {
            return false;
        }
        if self.dangling_marks.contains(&last) {
            return true;
        }

        if last.is_ascii_alphabetic() {
            let start = text
                .rfind(|c: char| !c.is_ascii_alphabetic())
                .map_or(0, |i| i + text[i..].chars().next().map_or(1, char::len_utf8));
            let word = text[start..].to_ascii_lowercase();
            return self.connectors.iter().any(|c| *c == word);
        }

        self.particles.iter().any(|p| text.ends_with(p.as_str()))
    }
}

/// Append `continuation` to `base`, dropping the longest prefix of the
/// continuation that repeats the end of `base`
pub fn merge_overlap(base: &str, continuation: &str) -> String {
    let continuation = continuation.trim_start();

    let overlap = (1..=continuation.len().min(base.len()))
        .rev()
        .filter(|&end| continuation.is_char_boundary(end))
        .find(|&end| {
            let head = &continuation[..end];
            head.chars().count() >= MIN_OVERLAP_CHARS && base.ends_with(head)
        })
        .unwrap_or(0);

    let rest = &continuation[overlap..];
    let needs_space = overlap == 0
        && base
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':'))
        && rest.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());

    let mut merged = String::with_capacity(base.len() + rest.len() + 1);
    merged.push_str(base);
    if needs_space {
        merged.push(' ');
    }
    merged.push_str(rest);
    merged
}
