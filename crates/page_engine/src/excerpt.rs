use ego_tree::iter::Edge;
use scraper::node::Node;
use scraper::Html;

use crate::types::PageRecord;

const DEFAULT_PRUNE_LENGTH: usize = 140;
const DEFAULT_OMISSION: &str = "\u{2026}";

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptOptions {
    /// Maximum number of characters kept before the omission marker.
    pub prune_length: usize,
    pub omission: String,
}

impl Default for ExcerptOptions {
    fn default() -> Self {
        Self {
            prune_length: DEFAULT_PRUNE_LENGTH,
            omission: DEFAULT_OMISSION.to_string(),
        }
    }
}

impl PageRecord {
    /// Short plain-text summary of the page, computed on demand.
    ///
    /// An explicit `excerpt` attribute wins over the compiled html. Without
    /// `options` the configured excerpt options apply.
    pub fn create_excerpt(&self, options: Option<&ExcerptOptions>) -> String {
        let options = options.unwrap_or(&self.excerpt_options);
        let explicit = self
            .get("excerpt")
            .filter(|value| value.is_truthy())
            .and_then(|value| value.to_plain_string());
        match explicit {
            Some(excerpt) => create_excerpt(&format!("<p>{excerpt}</p>"), options),
            None => create_excerpt(self.html.as_deref().unwrap_or_default(), options),
        }
    }
}

/// Strips markup from `html` and prunes the text on a word boundary.
pub fn create_excerpt(html: &str, options: &ExcerptOptions) -> String {
    let text = html_to_text(html);
    prune(&text, options.prune_length, &options.omission)
}

fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let mut raw = String::new();
    let mut skip_depth = 0usize;

    for edge in fragment.root_element().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(el) if matches!(el.name(), "script" | "style" | "template") => {
                    skip_depth += 1;
                }
                Node::Text(text) if skip_depth == 0 => raw.push_str(text),
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    if matches!(el.name(), "script" | "style" | "template") {
                        skip_depth = skip_depth.saturating_sub(1);
                    } else if BLOCK_TAGS.contains(&el.name()) {
                        raw.push(' ');
                    }
                }
            }
        }
    }

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to at most `length` characters without splitting a word and
/// appends `omission`. Text that already fits is returned unchanged.
fn prune(text: &str, length: usize, omission: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= length {
        return text.to_string();
    }

    let head = &chars[..length + 1];
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let cuts_word = head.len() >= 2 && is_word(head[head.len() - 1]) && is_word(head[head.len() - 2]);

    let mut keep = if cuts_word {
        let mut end = head.len();
        while end > 0 && !head[end - 1].is_whitespace() {
            end -= 1;
        }
        end
    } else {
        head.len() - 1
    };
    while keep > 0 && head[keep - 1].is_whitespace() {
        keep -= 1;
    }

    if keep + omission.chars().count() > chars.len() {
        return text.to_string();
    }
    let mut out: String = chars[..keep].iter().collect();
    out.push_str(omission);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit.</p>\n<p>Nunc ut finibus arcu.</p>";

    #[test]
    fn prunes_on_word_boundary() {
        let options = ExcerptOptions {
            prune_length: 6,
            ..ExcerptOptions::default()
        };
        assert_eq!(create_excerpt(TEXT, &options), "Lorem\u{2026}");
    }

    #[test]
    fn mid_word_cut_drops_the_partial_word() {
        let options = ExcerptOptions {
            prune_length: 14,
            ..ExcerptOptions::default()
        };
        assert_eq!(create_excerpt(TEXT, &options), "Lorem ipsum\u{2026}");
    }

    #[test]
    fn block_elements_are_separated() {
        let text = create_excerpt(TEXT, &ExcerptOptions::default());
        assert_eq!(
            text,
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nunc ut finibus arcu."
        );
    }

    #[test]
    fn scripts_are_ignored_and_empty_html_is_empty() {
        assert_eq!(
            create_excerpt("<p>a<script>var x;</script> b</p>", &ExcerptOptions::default()),
            "a b"
        );
        assert_eq!(create_excerpt("", &ExcerptOptions::default()), "");
    }

    #[test]
    fn custom_omission() {
        let options = ExcerptOptions {
            prune_length: 11,
            omission: "...".to_string(),
        };
        assert_eq!(create_excerpt(TEXT, &options), "Lorem ipsum...");
    }
}
