//! Chat markup cleanup applied before text reaches the chain.

use regex::Regex;
use std::sync::OnceLock;

fn markup_regex() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"<([^>]+)>").expect("markup pattern is valid"))
}

/// Strips chat markup from an incoming message.
///
/// - links (`<http…>`, `<mailto…>`) are dropped
/// - user mentions `<@U123|bob>` become `@bob`, `<@name>` becomes `@name`
/// - channel links `<#C123|general>` become `#general`
///
/// Mentions and channel links without a label are dropped. The result is
/// trimmed and the `&lt;`, `&gt;` and `&amp;` escapes are decoded last.
pub fn clean_text(text: &str) -> String {
    let cleaned = markup_regex().replace_all(text, |caps: &regex::Captures| {
        let inner = &caps[1];
        if inner.starts_with("http") || inner.starts_with("mailto") {
            String::new()
        } else if inner.starts_with("@U") {
            labelled(inner, '@')
        } else if inner.starts_with('@') {
            inner.to_string()
        } else if inner.starts_with('#') {
            labelled(inner, '#')
        } else {
            caps[0].to_string()
        }
    });

    cleaned
        .trim()
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn labelled(inner: &str, sigil: char) -> String {
    match inner.split_once('|') {
        Some((_, label)) => format!("{sigil}{label}"),
        None => String::new(),
    }
}
