use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::value::{Attributes, Value, TIMESTAMP_TAG};

const OPENING_FENCES: [&str; 2] = ["---", "= yaml ="];
const CLOSING_FENCES: [&str; 2] = ["---", "..."];

/// A block mapping or sequence entry whose value is an unquoted YAML timestamp.
static PLAIN_TIMESTAMP_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<lead>[ \t]*(?:-[ \t]+)*(?:(?:[^\s#'"\-\[\]{}?&*!|>%@`][^:#]*|"[^"]*"|'[^']*')[ \t]*:[ \t]+)?)(?P<value>\d{4}-\d{1,2}-\d{1,2}(?:(?:[Tt]|[ \t]+)\d{1,2}:\d{2}:\d{2}(?:\.\d+)?(?:[ \t]*(?:Z|[-+]\d{1,2}(?::?\d{2})?))?)?)(?P<tail>(?:[ \t]+#.*)?[ \t]*)$"#,
    )
    .unwrap()
});

static BLOCK_SCALAR_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?::|^[ \t]*-)[ \t]+[|>][-+1-9]*[ \t]*(?:#.*)?$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFrontMatter {
    pub attributes: Attributes,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("invalid front matter yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Splits raw text into metadata attributes and body.
pub trait FrontMatterParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<ParsedFrontMatter, FrontMatterError>;
}

/// `---` fenced YAML at the very start of the input.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlFrontMatter;

impl FrontMatterParser for YamlFrontMatter {
    fn parse(&self, raw: &str) -> Result<ParsedFrontMatter, FrontMatterError> {
        let Some((yaml, body)) = split_fences(raw) else {
            return Ok(ParsedFrontMatter {
                attributes: Attributes::new(),
                body: raw.to_string(),
            });
        };

        let attributes = if yaml.trim().is_empty() {
            Attributes::new()
        } else {
            match Value::from_yaml(serde_yaml::from_str(&tag_plain_timestamps(yaml))?) {
                Value::Mapping(map) => map,
                _ => Attributes::new(),
            }
        };

        Ok(ParsedFrontMatter {
            attributes,
            body: body.to_string(),
        })
    }
}

/// Returns `(yaml, body)` when the input opens with a fence that is closed later on.
fn split_fences(raw: &str) -> Option<(&str, &str)> {
    let input = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let (first, mut rest) = split_line(input);
    if !OPENING_FENCES.contains(&first.trim_end()) {
        return None;
    }

    let yaml_start = rest;
    let mut yaml_len = 0;
    loop {
        if rest.is_empty() {
            return None;
        }
        let (line, next) = split_line(rest);
        if CLOSING_FENCES.contains(&line.trim_end()) {
            return Some((&yaml_start[..yaml_len], next));
        }
        yaml_len += rest.len() - next.len();
        rest = next;
    }
}

/// Marks unquoted timestamp values with [`TIMESTAMP_TAG`]. `serde_yaml` reports
/// plain and quoted scalars alike, so the scalar style is read off the source:
/// `date: 2013-02-01` is tagged, `date: "2013-02-01"` stays a string.
/// Lines inside block scalars are left alone.
fn tag_plain_timestamps(yaml: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(yaml.len());
    let mut tagged = false;
    let mut block_indent: Option<usize> = None;

    for line in yaml.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let ending = &line[content.len()..];
        let indent = content.len() - content.trim_start_matches([' ', '\t']).len();

        if let Some(block) = block_indent {
            if content.trim().is_empty() || indent > block {
                out.push_str(line);
                continue;
            }
            block_indent = None;
        }
        if BLOCK_SCALAR_HEADER.is_match(content) {
            block_indent = Some(indent);
        }

        match PLAIN_TIMESTAMP_ENTRY.captures(content) {
            Some(caps) if !caps["lead"].trim().is_empty() => {
                out.push_str(&caps["lead"]);
                out.push_str(TIMESTAMP_TAG);
                out.push(' ');
                out.push_str(&caps["value"]);
                out.push_str(&caps["tail"]);
                out.push_str(ending);
                tagged = true;
            }
            _ => out.push_str(line),
        }
    }

    if tagged {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(yaml)
    }
}

/// Splits off the first line; the returned line excludes its `\n` / `\r\n`.
fn split_line(input: &str) -> (&str, &str) {
    match input.find('\n') {
        Some(pos) => (input[..pos].trim_end_matches('\r'), &input[pos + 1..]),
        None => (input, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(raw: &str) -> ParsedFrontMatter {
        YamlFrontMatter.parse(raw).unwrap()
    }

    #[test]
    fn fenced_block_becomes_attributes() {
        let parsed = parse("---\na: b\n---");
        assert_eq!(parsed.attributes.get("a"), Some(&Value::from("b")));
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn single_newline_after_fence_is_consumed() {
        let parsed = parse("---\ntitle: Hi\n---\n\nBody text\n");
        assert_eq!(parsed.body, "\nBody text\n");
    }

    #[test]
    fn missing_fence_keeps_whole_input() {
        let parsed = parse("no front matter\n---\n");
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.body, "no front matter\n---\n");
    }

    #[test]
    fn unclosed_fence_keeps_whole_input() {
        let parsed = parse("---\na: b\nbody");
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.body, "---\na: b\nbody");
    }

    #[test]
    fn crlf_bom_and_dot_terminator() {
        let parsed = parse("\u{feff}---\r\na: 1\r\n...\r\nrest");
        assert_eq!(parsed.attributes.get("a"), Some(&Value::Integer(1)));
        assert_eq!(parsed.body, "rest");
    }

    #[test]
    fn empty_block_yields_no_attributes() {
        let parsed = parse("---\n---\nbody");
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn sequences_survive() {
        let parsed = parse("---\ncategories: \n - hello\n - world\n---");
        assert_eq!(
            parsed.attributes.get("categories"),
            Some(&Value::Sequence(vec![Value::from("hello"), Value::from("world")]))
        );
    }

    #[test]
    fn only_unquoted_dates_become_timestamps() {
        let parsed = parse(
            "---\ndate: 2013-02-01\nslug: \"2013-02-01\"\ntitle: '2013-02-01'\n---",
        );
        assert!(matches!(parsed.attributes.get("date"), Some(Value::Timestamp(_))));
        assert_eq!(parsed.attributes.get("slug"), Some(&Value::from("2013-02-01")));
        assert_eq!(parsed.attributes.get("title"), Some(&Value::from("2013-02-01")));
    }

    #[test]
    fn timestamp_tagging_skips_quotes_comments_and_block_scalars() {
        assert_eq!(
            tag_plain_timestamps("a: 2013-02-01 # note\n- 2001-12-14 21:59:43.10 -5\n"),
            "a: !timestamp 2013-02-01 # note\n- !timestamp 2001-12-14 21:59:43.10 -5\n"
        );
        assert_eq!(tag_plain_timestamps("a: \"2013-02-01\"\n"), "a: \"2013-02-01\"\n");
        assert_eq!(
            tag_plain_timestamps("text: |\n  b: 2013-02-01\nc: 2013-02-02"),
            "text: |\n  b: 2013-02-01\nc: !timestamp 2013-02-02"
        );
        assert_eq!(tag_plain_timestamps("note: 2013-02-01 later"), "note: 2013-02-01 later");
    }

    #[test]
    fn dates_in_lists_and_block_text() {
        let parsed = parse("---\nevents:\n  - 2013-02-01\n  - \"2013-02-02\"\nabout: >\n  2013-02-03\n---");
        let Some(Value::Sequence(events)) = parsed.attributes.get("events") else {
            panic!("expected a sequence");
        };
        assert!(matches!(events[0], Value::Timestamp(_)));
        assert_eq!(events[1], Value::from("2013-02-02"));
        assert_eq!(parsed.attributes.get("about"), Some(&Value::from("2013-02-03\n")));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(YamlFrontMatter.parse("---\ntitle: [broken\n---\n").is_err());
    }
}
