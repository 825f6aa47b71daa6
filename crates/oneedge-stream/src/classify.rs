//! Heuristic query classification used to pick models for comparison runs.
//!
//! Pure and total: identical input always yields identical output, and the
//! default branch guarantees a result for every string.

use once_cell::sync::Lazy;
use regex::Regex;

/// Category assigned to a user prompt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// General conversation (default).
    Chat,
    /// Programming or debugging request.
    Code,
    /// Image generation or editing request.
    Image,
    /// Summarization, comparison, or research request.
    Analysis,
}

/// Structural code evidence: stronger than any keyword hit, so it is checked
/// first.
static CODE_STRUCTURE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Fenced code block.
        r"```",
        // Source file name with a recognizable extension.
        r"(?i)\b[\w./-]+\.(rs|py|js|jsx|ts|tsx|java|go|rb|c|h|cpp|cs|php|sh|sql|html|css|json|ya?ml|toml)\b",
        // Function/class/import syntax across common languages.
        r"(?i)\b(fn|def|function)\s+\w+\s*\(",
        r"(?i)\bclass\s+\w+",
        r"(?i)\b(import|from)\s+[\w.{]+|#include\s*[<\x22]",
        // Stack-trace-ish or shell-invocation fragments.
        r"(?m)^\s*(\$|>>>)\s+\w+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("hard-coded pattern compiles"))
    .collect()
});

const CODE_KEYWORDS: &[&str] = &[
    "code",
    "function",
    "debug",
    "error",
    "compile",
    "syntax",
    "algorithm",
    "script",
    "program",
    "variable",
    "loop",
    "array",
    "regex",
    "sql query",
    "api endpoint",
    "stack trace",
    "refactor",
    "unit test",
    "typescript",
    "javascript",
    "python",
    "rust",
    "java",
    "bug",
    "implement",
];

const IMAGE_KEYWORDS: &[&str] = &[
    "image",
    "picture",
    "photo",
    "draw",
    "sketch",
    "illustration",
    "logo",
    "icon",
    "render",
    "painting",
    "wallpaper",
    "portrait",
    "artwork",
    "thumbnail",
    "banner",
];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "summarize",
    "summary",
    "analyze",
    "analysis",
    "compare",
    "comparison",
    "research",
    "evaluate",
    "review",
    "report",
    "insight",
    "statistic",
    "trend",
    "breakdown",
    "pros and cons",
];

/// Classifies a prompt into one of the four query kinds.
///
/// Priority order, first match wins: structural code patterns, code
/// keywords, image keywords, analysis keywords, then the `Chat` default.
/// Keyword matching is case-insensitive substring matching.
pub fn classify(query: &str) -> QueryKind {
    if CODE_STRUCTURE.iter().any(|re| re.is_match(query)) {
        return QueryKind::Code;
    }
    let lowered = query.to_lowercase();
    if CODE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return QueryKind::Code;
    }
    if IMAGE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return QueryKind::Image;
    }
    if ANALYSIS_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return QueryKind::Analysis;
    }
    QueryKind::Chat
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_code_beats_keywords() {
        assert_eq!(classify("```function foo() {}```"), QueryKind::Code);
        assert_eq!(classify("what is wrong with main.rs here"), QueryKind::Code);
        assert_eq!(classify("def handler(event):"), QueryKind::Code);
    }

    #[test]
    fn keyword_tiers_apply_in_priority_order() {
        assert_eq!(
            classify("please draw a logo for my company"),
            QueryKind::Image
        );
        assert_eq!(
            classify("summarize this 50-page report"),
            QueryKind::Analysis
        );
        // A code keyword outranks an image keyword in the same prompt.
        assert_eq!(
            classify("debug why the image upload fails"),
            QueryKind::Code
        );
    }

    #[test]
    fn default_is_chat() {
        assert_eq!(classify("hello, how are you?"), QueryKind::Chat);
        assert_eq!(classify(""), QueryKind::Chat);
    }

    #[test]
    fn classification_is_deterministic() {
        let prompt = "compare the pros and cons of these vendors";
        let first = classify(prompt);
        for _ in 0..10 {
            assert_eq!(classify(prompt), first);
        }
        assert_eq!(first, QueryKind::Analysis);
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        assert_eq!(classify("SUMMARIZE the meeting notes"), QueryKind::Analysis);
        assert_eq!(classify("Draw me a PORTRAIT"), QueryKind::Image);
    }
}
