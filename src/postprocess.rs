use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::Result;

/// A `{term: replacement}` map loaded from a glossary file.
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    terms: BTreeMap<String, String>,
}

impl Glossary {
    /// Parse `TERM => REPLACEMENT` lines. `#`-prefixed lines are comments;
    /// any other unrecognized line is silently skipped.
    pub fn parse(contents: &str) -> Self {
        let mut terms = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((term, replacement)) = line.split_once("=>") {
                let term = term.trim();
                let replacement = replacement.trim();
                if !term.is_empty() {
                    terms.insert(term.to_string(), replacement.to_string());
                }
            }
        }
        Self { terms }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&contents))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms ordered longest-first so a shorter term never pre-empts a
    /// longer compound replacement.
    fn terms_longest_first(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> =
            self.terms.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        entries.sort_by_key(|(term, _)| std::cmp::Reverse(term.len()));
        entries
    }
}

/// Collapse runs of spaces/tabs to single spaces; collapse 3+ newlines to
/// exactly two; trim each line; trim the whole text. Idempotent.
pub fn normalize_whitespace(text: &str) -> String {
    static SPACES: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
    static NEWLINES: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

    let text = SPACES.replace_all(text, " ");
    let text = NEWLINES.replace_all(&text, "\n\n");

    let lines: Vec<String> = text.split('\n').map(|l| l.trim().to_string()).collect();
    lines.join("\n").trim().to_string()
}

/// Collapse runs of identical consecutive words (case-insensitive
/// comparison), keeping the first occurrence. Operates per line.
pub fn remove_repeated_words(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    text.split('\n')
        .map(dedupe_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn dedupe_line(line: &str) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return String::new();
    }

    let mut result: Vec<&str> = vec![tokens[0]];
    for token in &tokens[1..] {
        if token.to_lowercase() != result.last().unwrap().to_lowercase() {
            result.push(token);
        }
    }
    result.join(" ")
}

/// Case-insensitive substring replacement, longest terms first.
pub fn apply_glossary(text: &str, glossary: &Glossary) -> String {
    if glossary.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    for (term, replacement) in glossary.terms_longest_first() {
        let pattern = match Regex::new(&format!("(?i){}", regex::escape(term))) {
            Ok(re) => re,
            Err(_) => continue,
        };
        out = pattern.replace_all(&out, regex::NoExpand(replacement)).into_owned();
    }
    out
}

/// Small closed set of terminal interjections that get a trailing period,
/// per language, matching the original's conservative punctuation pass.
fn add_minimal_punctuation(text: &str, language: &str) -> String {
    // Already has reasonable punctuation density; leave it alone.
    if text.matches('.').count() as f64 > text.len() as f64 / 100.0 {
        return text.to_string();
    }

    let patterns: &[(&str, &str)] = match language {
        "ar" => &[
            (r"(\s)(شكرا|شكراً|والسلام|إن شاء الله)(\s)", "$1$2.$3"),
            (r"(\s)(نعم|لا|حسناً|جيد|صحيح)(\s)", "$1$2.$3"),
        ],
        "en" => &[(r"(?i)(\s)(thank you|thanks|okay|yes|no)(\s)", "$1$2.$3")],
        _ => return text.to_string(),
    };

    let mut out = text.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = Regex::new(pattern) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}

/// C10: whitespace normalize, optionally substitute glossary terms, optional
/// light formatting (opt-in, disabled by default), final whitespace pass.
pub fn clean_transcript(text: &str, glossary: Option<&Glossary>, language: &str, light_formatting: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = normalize_whitespace(text);

    if let Some(glossary) = glossary {
        out = apply_glossary(&out, glossary);
    }

    if light_formatting {
        out = remove_repeated_words(&out);
        out = add_minimal_punctuation(&out, language);
    }

    normalize_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_whitespace_is_idempotent() {
        let input = "  hello   world  \n\n\n\nfoo  ";
        let once = normalize_whitespace(input);
        let twice = normalize_whitespace(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_whitespace_collapses_runs() {
        let out = normalize_whitespace("a    b\n\n\n\nc");
        assert_eq!(out, "a b\n\nc");
    }

    #[test]
    fn glossary_parses_arrow_rules_and_skips_comments() {
        let glossary = Glossary::parse("# comment\nHTTP => Hypertext Transfer Protocol\n\nnot a rule\nAPI => Application Programming Interface\n");
        assert_eq!(glossary.terms.get("HTTP").unwrap(), "Hypertext Transfer Protocol");
        assert_eq!(glossary.terms.len(), 2);
    }

    #[test]
    fn glossary_applies_longest_term_first() {
        let glossary = Glossary::parse("A => short\nAB => long\n");
        let out = apply_glossary("we saw AB here", &glossary);
        assert_eq!(out, "we saw long here");
    }

    #[test]
    fn glossary_substitution_is_case_insensitive() {
        let glossary = Glossary::parse("api => API\n");
        let out = apply_glossary("the Api is great", &glossary);
        assert_eq!(out, "the API is great");
    }

    #[test]
    fn remove_repeated_words_keeps_first_occurrence() {
        let out = remove_repeated_words("yes yes Yes no no");
        assert_eq!(out, "yes no");
    }

    #[test]
    fn clean_transcript_runs_full_pipeline() {
        let glossary = Glossary::parse("foo => bar\n");
        let out = clean_transcript("  foo   foo  ", Some(&glossary), "en", false);
        assert_eq!(out, "bar   bar".split_whitespace().collect::<Vec<_>>().join(" "));
    }
}
