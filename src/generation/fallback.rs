//! Template-based fallback commenter
//!
//! Classifies forwarded text by keyword and picks a canned sarcastic remark.
//! Selection is driven by a SHA-256 digest of the input, so the same text
//! always yields the same comment.

use crate::generation::CommentStyle;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Exaggeration,
    Contradiction,
    FactualClaim,
    General,
}

/// Static keyword lists — zero allocation
const EXAGGERATION_KEYWORDS: &[&str] = &[
    "all", "never", "always", "absolutely", "completely", "totally",
    "millions", "thousands", "everyone", "catastrophe",
    "все", "никогда", "всегда", "абсолютно", "полностью", "совершенно",
    "миллионы", "тысячи", "всеобщий", "тотальный", "катастрофа",
];

const CONTRADICTION_KEYWORDS: &[&str] = &[
    "but", "however", "although", "though", "despite", "nevertheless",
    "on the other hand", "at the same time",
    "но", "однако", "хотя", "несмотря на", "в то же время", "с другой стороны",
];

const FACTUAL_TEMPLATES: &[&str] = &[
    "An interesting reading of the facts, especially given that {context}",
    "A truly original version of events. Shame reality holds a different opinion",
    "The facts are impressive indeed, as long as {context} counts as a fact",
];

const EXAGGERATION_TEMPLATES: &[&str] = &[
    "Ironclad logic, provided you ignore a few key details",
    "Exaggeration? Not at all! Just an alternative kind of arithmetic",
    "The numbers speak for themselves, just not in the direction claimed",
    "The scale is impressive, especially with a custom system of measurement",
];

const CONTRADICTION_TEMPLATES: &[&str] = &[
    "A curious combination of claims, particularly the way they contradict each other",
    "Two thoughts at once is always interesting, especially mutually exclusive ones",
    "The logical sequence holds up nicely if you read the sentences backwards",
];

const GENERAL_TEMPLATES: &[&str] = &[
    "A point of view that certainly has a right to exist. Like any other",
    "An interesting approach to interpreting reality",
    "An original version of events, if not quite the commonly accepted one",
    "Peculiar logic, but who am I to argue with alternative mathematics",
    "A bold claim, especially considering that {context}",
];

const DETAILED_ADDITIONS: &[&str] = &[
    "It is especially interesting how these statements relate to one another.",
    "The chain of reasoning is, without doubt, original.",
    "The facts and figures add up to a rather intriguing picture.",
    "This version of events has a right to exist, like any other.",
];

const TOO_SHORT_REPLY: &str = "Too short for a deep analysis. The idea is intriguing, though.";

/// Local comment generator used when the remote backend is unavailable
pub struct TemplateCommenter;

impl TemplateCommenter {
    /// Produce a comment for `text` in the requested style
    pub fn comment(text: &str, style: CommentStyle) -> String {
        match style {
            CommentStyle::Short => Self::short_comment(text),
            CommentStyle::Detailed => {
                let base = Self::short_comment(&strip_labels(text));
                let first = pick_index(DETAILED_ADDITIONS.len(), text, 2);
                let offset = 1 + pick_index(DETAILED_ADDITIONS.len() - 1, text, 3);
                let second = (first + offset) % DETAILED_ADDITIONS.len();

                format!(
                    "{} {} {}",
                    base, DETAILED_ADDITIONS[first], DETAILED_ADDITIONS[second]
                )
            }
        }
    }

    /// Classify forwarded text by its most telling feature
    pub fn classify(text: &str) -> MessageKind {
        let lowered = text.to_lowercase();
        let words = words(&lowered);

        if keyword_hits(&lowered, &words, EXAGGERATION_KEYWORDS) >= 2 {
            return MessageKind::Exaggeration;
        }

        if keyword_hits(&lowered, &words, CONTRADICTION_KEYWORDS) >= 2 {
            return MessageKind::Contradiction;
        }

        if text.chars().any(|c| c.is_ascii_digit()) {
            return MessageKind::FactualClaim;
        }

        MessageKind::General
    }

    fn short_comment(text: &str) -> String {
        if text.trim().chars().count() < CommentStyle::Short.min_input_chars() {
            return TOO_SHORT_REPLY.to_string();
        }

        let templates = match Self::classify(text) {
            MessageKind::Exaggeration => EXAGGERATION_TEMPLATES,
            MessageKind::Contradiction => CONTRADICTION_TEMPLATES,
            MessageKind::FactualClaim => FACTUAL_TEMPLATES,
            MessageKind::General => GENERAL_TEMPLATES,
        };
        let template = templates[pick_index(templates.len(), text, 0)];

        if !template.contains("{context}") {
            return template.to_string();
        }

        match extract_context(text) {
            Some(context) => template.replace("{context}", &context),
            None => {
                let plain: Vec<&str> = GENERAL_TEMPLATES
                    .iter()
                    .copied()
                    .filter(|t| !t.contains("{context}"))
                    .collect();
                plain[pick_index(plain.len(), text, 1)].to_string()
            }
        }
    }
}

/// Drop the "[Message i, HH:MM:SS]" headers and separators of a rendered context
fn strip_labels(rendered: &str) -> String {
    rendered
        .lines()
        .filter(|line| {
            let line = line.trim();
            !(line == "---" || (line.starts_with("[Message ") && line.ends_with(']')))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull a short hint out of the text to splice into a template
fn extract_context(text: &str) -> Option<String> {
    if text.chars().any(|c| c.is_ascii_digit()) {
        return Some("the numbers say otherwise".to_string());
    }

    text.split(['.', '!', '?'])
        .find(|sentence| {
            let lowered = sentence.to_lowercase();
            keyword_hits(&lowered, &words(&lowered), EXAGGERATION_KEYWORDS) > 0
        })
        .map(|sentence| {
            let head: Vec<&str> = sentence.split_whitespace().take(5).collect();
            format!("{}...", head.join(" "))
        })
}

fn words(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Count keywords present; phrases match as substrings, single words as whole words
fn keyword_hits(lowered: &str, words: &[&str], keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|kw| {
            if kw.contains(' ') {
                lowered.contains(**kw)
            } else {
                words.contains(*kw)
            }
        })
        .count()
}

fn pick_index(len: usize, text: &str, salt: u8) -> usize {
    if len == 0 {
        return 0;
    }

    let mut hasher = Sha256::new();
    hasher.update([salt]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exaggeration() {
        let text = "Everyone always knew this, it never fails";
        assert_eq!(TemplateCommenter::classify(text), MessageKind::Exaggeration);

        let text = "Все и всегда об этом знали";
        assert_eq!(TemplateCommenter::classify(text), MessageKind::Exaggeration);
    }

    #[test]
    fn test_classify_contradiction() {
        let text = "It works, but it is broken; however nobody minds";
        assert_eq!(TemplateCommenter::classify(text), MessageKind::Contradiction);
    }

    #[test]
    fn test_classify_factual_and_general() {
        assert_eq!(
            TemplateCommenter::classify("Prices rose by 40 percent last year"),
            MessageKind::FactualClaim
        );
        assert_eq!(
            TemplateCommenter::classify("The weather looks pleasant today"),
            MessageKind::General
        );
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "all" must not match inside "really" or "ball"
        assert_eq!(
            TemplateCommenter::classify("Really a ball of fun, never mind"),
            MessageKind::General
        );
    }

    #[test]
    fn test_short_text_reply() {
        assert_eq!(TemplateCommenter::comment("hmm", CommentStyle::Short), TOO_SHORT_REPLY);
    }

    #[test]
    fn test_comment_is_deterministic() {
        let text = "Inflation will absolutely never return, everyone always says so";
        let first = TemplateCommenter::comment(text, CommentStyle::Detailed);
        let second = TemplateCommenter::comment(text, CommentStyle::Detailed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_factual_comment_has_no_placeholder() {
        for i in 0..20 {
            let text = format!("Sales grew {} times in {} days", i + 2, i + 5);
            let comment = TemplateCommenter::comment(&text, CommentStyle::Short);
            assert!(!comment.contains("{context}"), "{}", comment);
            assert!(FACTUAL_TEMPLATES
                .iter()
                .any(|t| comment == t.replace("{context}", "the numbers say otherwise")));
        }
    }

    #[test]
    fn test_detailed_adds_two_distinct_sentences() {
        let text = "A perfectly ordinary forwarded announcement";
        let short = TemplateCommenter::comment(text, CommentStyle::Short);
        let detailed = TemplateCommenter::comment(text, CommentStyle::Detailed);

        assert!(detailed.starts_with(&short));
        let additions: Vec<&&str> = DETAILED_ADDITIONS
            .iter()
            .filter(|a| detailed.contains(**a))
            .collect();
        assert_eq!(additions.len(), 2);
    }

    #[test]
    fn test_detailed_ignores_render_labels() {
        let rendered = "[Message 1, 10:15:00]\nThe weather looks pleasant today\n\n---\n\n[Message 2, 10:16:00]\nA calm and quiet evening ahead";
        assert_eq!(TemplateCommenter::classify(&strip_labels(rendered)), MessageKind::General);
        assert_eq!(TemplateCommenter::classify(rendered), MessageKind::FactualClaim);
    }

    #[test]
    fn test_general_comment_never_leaves_placeholder() {
        let texts = [
            "The weather looks pleasant today",
            "A calm and quiet evening ahead",
            "Nothing much happened at the meeting",
            "The new cafe opened on the corner",
            "Our team moved to another office",
            "Spring arrived a little early",
        ];
        for text in texts {
            let comment = TemplateCommenter::comment(text, CommentStyle::Short);
            assert!(!comment.contains("{context}"), "{}", comment);
        }
    }

    #[test]
    fn test_general_context_template_is_filled() {
        // A single exaggeration keyword keeps the text general but yields a hint
        let text = "The meeting went absolutely fine";
        assert_eq!(TemplateCommenter::classify(text), MessageKind::General);

        let hint = extract_context(text).unwrap();
        assert_eq!(hint, "The meeting went absolutely fine...");

        let comment = TemplateCommenter::comment(text, CommentStyle::Short);
        assert!(GENERAL_TEMPLATES
            .iter()
            .any(|t| comment == t.replace("{context}", &hint)));
    }

    #[test]
    fn test_extract_context_from_exaggeration() {
        let context = extract_context("Calm start. Absolutely everything collapsed overnight in the city!");
        assert_eq!(context.as_deref(), Some("Absolutely everything collapsed overnight in..."));
    }
}
