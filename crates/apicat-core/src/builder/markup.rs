//! Declaration syntax markup: tagged text to token stream.
//!
//! Producers render declarations as lightly tagged text, for example
//! `<k>public</k> <k>class</k> <t ref="…">List</t>&lt;T&gt;`.  Tags carry
//! the token kind; `t` and `r` may carry a `ref` fingerprint pointing at
//! another API.  Untagged text becomes whitespace and punctuation tokens.
//! Parsing never fails: anything that does not form a well-formed element is
//! kept as literal text.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Fingerprint, MarkupTokenKind};

static OPEN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^<([kpwnstr])(?:\s+ref="([^"]*)")?\s*>"#).unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupToken {
    pub kind: MarkupTokenKind,
    pub text: String,
    pub reference: Option<Fingerprint>,
}

impl MarkupToken {
    fn plain(kind: MarkupTokenKind, text: String) -> Self {
        Self {
            kind,
            text,
            reference: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markup {
    pub tokens: Vec<MarkupToken>,
}

impl Markup {
    pub fn parse(text: &str) -> Markup {
        let mut tokens = Vec::new();
        let mut plain = String::new();
        let mut rest = text;

        while let Some(ch) = rest.chars().next() {
            if ch == '<' {
                if let Some((token, consumed)) = parse_element(rest) {
                    flush_plain(&mut plain, &mut tokens);
                    tokens.push(token);
                    rest = &rest[consumed..];
                    continue;
                }
            }
            if ch == '&' {
                if let Some((decoded, consumed)) = decode_entity(rest) {
                    plain.push(decoded);
                    rest = &rest[consumed..];
                    continue;
                }
            }
            plain.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
        flush_plain(&mut plain, &mut tokens);

        Markup { tokens }
    }

    pub fn to_plain_text(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// Fingerprints referenced by the markup, in token order.
    pub fn references(&self) -> impl Iterator<Item = &Fingerprint> {
        self.tokens.iter().filter_map(|t| t.reference.as_ref())
    }
}

fn kind_for_tag(tag: &str) -> MarkupTokenKind {
    match tag {
        "k" => MarkupTokenKind::Keyword,
        "w" => MarkupTokenKind::Whitespace,
        "n" => MarkupTokenKind::LiteralNumber,
        "s" => MarkupTokenKind::LiteralString,
        "t" => MarkupTokenKind::TypeReference,
        "r" => MarkupTokenKind::Reference,
        _ => MarkupTokenKind::Punctuation,
    }
}

fn parse_element(input: &str) -> Option<(MarkupToken, usize)> {
    let captures = OPEN_TAG_RE.captures(input)?;
    let open_len = captures.get(0)?.end();
    let tag = captures.get(1)?.as_str();
    let closing = format!("</{tag}>");
    let body_len = input[open_len..].find(&closing)?;
    let body = &input[open_len..open_len + body_len];
    if body.contains('<') {
        return None;
    }

    let kind = kind_for_tag(tag);
    let reference = match kind {
        MarkupTokenKind::TypeReference | MarkupTokenKind::Reference => captures
            .get(2)
            .and_then(|m| m.as_str().parse::<Fingerprint>().ok()),
        _ => None,
    };
    let token = MarkupToken {
        kind,
        text: decode_entities(body),
        reference,
    };
    Some((token, open_len + body_len + closing.len()))
}

fn decode_entity(input: &str) -> Option<(char, usize)> {
    const ENTITIES: &[(&str, char)] = &[
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&amp;", '&'),
        ("&quot;", '"'),
        ("&apos;", '\''),
    ];
    ENTITIES
        .iter()
        .find(|(entity, _)| input.starts_with(entity))
        .map(|(entity, ch)| (*ch, entity.len()))
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some((decoded, consumed)) = decode_entity(rest) {
                out.push(decoded);
                rest = &rest[consumed..];
                continue;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Split accumulated untagged text into whitespace and punctuation runs.
fn flush_plain(plain: &mut String, tokens: &mut Vec<MarkupToken>) {
    if plain.is_empty() {
        return;
    }
    let mut run = String::new();
    let mut run_is_space = false;
    for ch in plain.chars() {
        let is_space = ch.is_whitespace();
        if !run.is_empty() && is_space != run_is_space {
            tokens.push(MarkupToken::plain(
                plain_kind(run_is_space),
                std::mem::take(&mut run),
            ));
        }
        run_is_space = is_space;
        run.push(ch);
    }
    if !run.is_empty() {
        tokens.push(MarkupToken::plain(plain_kind(run_is_space), run));
    }
    plain.clear();
}

fn plain_kind(is_space: bool) -> MarkupTokenKind {
    if is_space {
        MarkupTokenKind::Whitespace
    } else {
        MarkupTokenKind::Punctuation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_declaration() {
        let list = Fingerprint::of("System.Collections.Generic.List`1");
        let text = format!(
            "<k>public</k> <k>class</k> <t ref=\"{list}\">List</t>&lt;<t>T</t>&gt;"
        );
        let markup = Markup::parse(&text);
        let kinds: Vec<MarkupTokenKind> = markup.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MarkupTokenKind::Keyword,
                MarkupTokenKind::Whitespace,
                MarkupTokenKind::Keyword,
                MarkupTokenKind::Whitespace,
                MarkupTokenKind::TypeReference,
                MarkupTokenKind::Punctuation,
                MarkupTokenKind::TypeReference,
                MarkupTokenKind::Punctuation,
            ]
        );
        assert_eq!(markup.tokens[4].reference, Some(list));
        assert_eq!(markup.tokens[6].reference, None);
        assert_eq!(markup.to_plain_text(), "public class List<T>");
        assert_eq!(markup.references().count(), 1);
    }

    #[test]
    fn test_parse_literals_and_entities() {
        let markup = Markup::parse("<k>const</k> <n>42</n> <s>&quot;a&amp;b&quot;</s>");
        assert_eq!(markup.tokens[2].kind, MarkupTokenKind::LiteralNumber);
        assert_eq!(markup.tokens[4].kind, MarkupTokenKind::LiteralString);
        assert_eq!(markup.tokens[4].text, "\"a&b\"");
    }

    #[test]
    fn test_parse_is_lenient() {
        let markup = Markup::parse("<x>odd</x> <k>unclosed");
        assert_eq!(markup.to_plain_text(), "<x>odd</x> <k>unclosed");
        assert!(markup
            .tokens
            .iter()
            .all(|t| t.kind != MarkupTokenKind::Keyword));
    }

    #[test]
    fn test_invalid_reference_dropped() {
        let markup = Markup::parse("<r ref=\"not-a-fingerprint\">M</r>");
        assert_eq!(markup.tokens.len(), 1);
        assert_eq!(markup.tokens[0].kind, MarkupTokenKind::Reference);
        assert_eq!(markup.tokens[0].reference, None);
    }

    #[test]
    fn test_empty_text() {
        assert!(Markup::parse("").tokens.is_empty());
    }
}
