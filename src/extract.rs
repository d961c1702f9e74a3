//! Best-effort markup to plain text.
//!
//! Not an HTML parser: a fixed list of regex rewrites run in order. Later
//! rules rely on earlier ones having consumed style/script blocks, titles,
//! headings and paragraphs.

use std::sync::LazyLock;

use regex::Regex;

/// Full-width double-space paragraph indent
pub const PARAGRAPH_INDENT: &str = "\u{3000}\u{3000}";

/// One rewrite step of the extractor
pub struct TextRule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl TextRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid extractor rule"),
            replacement,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, self.replacement).into_owned()
    }
}

static RULES: LazyLock<Vec<TextRule>> = LazyLock::new(|| {
    vec![
        TextRule::new("style", r"(?s)<style.*?</style>", ""),
        TextRule::new("script", r"(?s)<script.*?</script>", ""),
        TextRule::new("title", r"<title>(.*?)</title>", "# ${1}\n"),
        TextRule::new("heading", r"<h[1-6].*?>(.*?)</h[1-6]>", "# ${1}\n"),
        TextRule::new("paragraph", r"<p.*?>(.*?)</p>", "\u{3000}\u{3000}${1}\n"),
        TextRule::new("tags", r"<.*?>", ""),
        TextRule::new("blank-lines", r"\n\s*\n", "\n\n"),
    ]
});

/// The ordered rule list
pub fn rules() -> &'static [TextRule] {
    &RULES
}

/// Run every rule in order, then trim the result.
pub fn markup_to_text(content: &str) -> String {
    let mut text = content.to_string();
    for rule in rules() {
        let next = rule.apply(&text);
        if next.len() != text.len() {
            tracing::trace!("rule {} changed {} -> {} bytes", rule.name, text.len(), next.len());
        }
        text = next;
    }
    text.trim().to_string()
}
