//! Placeholder extraction and snippet classification.

use super::Classification;
use crate::core::StackyardError;

use std::ops::Range;

/// Return the bodies of the top-level `${...}` placeholders in `line`, left to right.
///
/// Nested placeholders are kept verbatim inside the outer body. A `$` only opens a
/// placeholder when followed by `{` with room left for a closing brace, so a `$` in
/// the last two characters never does. Stray `$`, unmatched `}` and unterminated
/// placeholders produce nothing.
///
/// ```
/// use stackyard::variables::extract_snippets;
///
/// let found = extract_snippets(r#"${func:print_s(message="${var:var1}")} tail"#);
/// assert_eq!(found, vec![r#"func:print_s(message="${var:var1}")"#.to_string()]);
/// assert_eq!(extract_snippets(&found[0]), vec!["var:var1".to_string()]);
/// ```
pub fn extract_snippets(line: &str) -> Vec<String> {
    snippet_spans(line).into_iter().map(|span| snippet_body(line, &span).to_string()).collect()
}

/// Byte ranges of the top-level placeholders in `line`, each covering `${` through `}`.
///
/// Same scanning rules as [`extract_snippets`].
pub fn snippet_spans(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut skip = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'$' if i + 2 < bytes.len() && bytes[i + 1] == b'{' => {
                if start.is_some() {
                    skip += 1;
                } else {
                    start = Some(i);
                }
                i += 2;
                continue;
            }
            b'}' => {
                if let Some(open) = start {
                    if skip == 0 {
                        spans.push(open..i + 1);
                        start = None;
                    } else {
                        skip -= 1;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    spans
}

/// The text between `${` and `}` of a span from [`snippet_spans`].
pub fn snippet_body<'a>(line: &'a str, span: &Range<usize>) -> &'a str {
    &line[span.start + 2..span.end - 1]
}

/// A snippet split into its evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snippet<'a> {
    /// `build-variable:` or `exports:`, returned verbatim from the store
    Stored {
        classification: Classification,
        id: &'a str,
    },
    /// `ref:`, the resolved value of a build variable
    Ref { id: &'a str },
    /// `env:`, an environment variable
    Env { name: &'a str },
    /// `shell:`, stdout of a command
    Shell { command: &'a str },
    /// `func:`, a registered function call
    Func { call: &'a str },
}

impl<'a> Snippet<'a> {
    /// Split `text` on its first `:` and pick the evaluation strategy.
    pub fn parse(text: &'a str) -> Result<Self, StackyardError> {
        let (tag, content) = text.split_once(':').ok_or_else(|| {
            StackyardError::MalformedSnippet {
                snippet: text.to_string(),
            }
        })?;

        let unsupported = || StackyardError::UnsupportedClassification {
            classification: tag.trim().to_string(),
            snippet: text.to_string(),
        };
        let classification: Classification = tag.trim().parse().map_err(|_| unsupported())?;

        match classification {
            Classification::BuildVariable | Classification::Exports => Ok(Self::Stored {
                classification,
                id: content.trim(),
            }),
            Classification::Ref => Ok(Self::Ref {
                id: content.trim(),
            }),
            Classification::Env => Ok(Self::Env {
                name: content.trim(),
            }),
            Classification::Shell => Ok(Self::Shell {
                command: content,
            }),
            Classification::Func => Ok(Self::Func {
                call: content.trim(),
            }),
            Classification::Other => Err(unsupported()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_placeholder_yields_nothing() {
        assert!(extract_snippets("").is_empty());
        assert!(extract_snippets("plain text with $ and } and {").is_empty());
        assert!(extract_snippets("cost: $5 {approx}").is_empty());
    }

    #[test]
    fn test_top_level_snippets_in_order() {
        let found = extract_snippets("XXX ${var:var1} XXX ${func:print_s()} XXX");
        assert_eq!(found, vec!["var:var1".to_string(), "func:print_s()".to_string()]);
    }

    #[test]
    fn test_nested_snippet_kept_verbatim() {
        let found = extract_snippets(r#"${func:print_s(message="${var:var1}")}"#);
        assert_eq!(found, vec![r#"func:print_s(message="${var:var1}")"#.to_string()]);

        let inner = extract_snippets(&found[0]);
        assert_eq!(inner, vec!["var:var1".to_string()]);
    }

    #[test]
    fn test_doubly_nested_snippet() {
        let found = extract_snippets("a ${x:${y:${z:1}}} b ${w:2}");
        assert_eq!(found, vec!["x:${y:${z:1}}".to_string(), "w:2".to_string()]);
    }

    #[test]
    fn test_spans_cover_whole_placeholders() {
        let line = "a ${x:${y:1}} b ${w:2}";
        let spans = snippet_spans(line);
        assert_eq!(spans, vec![2..13, 16..22]);
        assert_eq!(&line[spans[0].clone()], "${x:${y:1}}");
        assert_eq!(snippet_body(line, &spans[1]), "w:2");
    }

    #[test]
    fn test_stray_characters_are_ignored() {
        let found = extract_snippets("} $x ${env:HOME} }} $");
        assert_eq!(found, vec!["env:HOME".to_string()]);
    }

    #[test]
    fn test_dollar_at_end_never_opens() {
        assert!(extract_snippets("abc${").is_empty());
        assert!(extract_snippets("abc$").is_empty());
        assert_eq!(extract_snippets("${}"), vec![String::new()]);
    }

    #[test]
    fn test_unterminated_placeholder_is_dropped() {
        assert!(extract_snippets("${env:HOME").is_empty());
        assert_eq!(extract_snippets("${a:1} ${b:2"), vec!["a:1".to_string()]);
    }

    #[test]
    fn test_snippet_parse_dispatch() {
        assert_eq!(
            Snippet::parse("build-variable: region").unwrap(),
            Snippet::Stored {
                classification: Classification::BuildVariable,
                id: "region"
            }
        );
        assert_eq!(Snippet::parse("ref:aa").unwrap(), Snippet::Ref { id: "aa" });
        assert_eq!(Snippet::parse("env:HOME").unwrap(), Snippet::Env { name: "HOME" });
        assert_eq!(
            Snippet::parse("shell:echo a:b").unwrap(),
            Snippet::Shell { command: "echo a:b" }
        );
        assert_eq!(Snippet::parse("func:f(a=1)").unwrap(), Snippet::Func { call: "f(a=1)" });
    }

    #[test]
    fn test_snippet_parse_errors() {
        assert!(matches!(
            Snippet::parse("no-colon"),
            Err(StackyardError::MalformedSnippet { .. })
        ));
        assert!(matches!(
            Snippet::parse("var:var1"),
            Err(StackyardError::UnsupportedClassification { .. })
        ));
        assert!(matches!(
            Snippet::parse("other:x"),
            Err(StackyardError::UnsupportedClassification { .. })
        ));
    }
}
