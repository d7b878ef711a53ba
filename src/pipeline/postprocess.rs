//! Post-processing of model output before it is treated as LaTeX.
//!
//! Even when told not to, models often wrap the whole answer in a
//! `` ```latex `` fence. Those markers break compilation, so they are
//! removed here. The rule is deliberately narrow: the fence must open the
//! (trimmed) text with a `latex` or `tex` tag and close it at the very end.
//! Anything else is returned untouched, so a document that merely *contains*
//! a fence, or opens one without closing it, is never truncated.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_LATEX_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A```(?:latex|tex)[ \t]*\r?\n(.*?)\r?\n```\z").unwrap());

/// Strip an outer `` ```latex `` / `` ```tex `` fence, if and only if it
/// wraps the entire text.
pub fn strip_latex_fences(input: &str) -> String {
    match RE_LATEX_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

/// Cheap sanity check: does the text look like a full LaTeX document?
///
/// Used for a warning only. Whether the markup is usable is decided by the
/// compiler.
pub fn looks_like_complete_document(markup: &str) -> bool {
    markup.contains("\\documentclass") && markup.contains("\\end{document}")
}
