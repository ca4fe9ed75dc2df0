use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ego_tree::{NodeId, NodeRef};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::options::{ProcessOptions, UrlConverter, DEFAULT_SRC_ATTRIBS};
use crate::paths;

const FEATURED_CLASS: &str = "featured";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub id: String,
    pub src: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub classes: Option<Vec<String>>,
    pub selector: String,
    pub simple_src: Option<String>,
}

impl ImageDescriptor {
    pub fn is_featured(&self) -> bool {
        self.classes
            .as_ref()
            .is_some_and(|classes| classes.iter().any(|c| c == FEATURED_CLASS))
    }
}

#[derive(Clone)]
pub struct ImageOptions {
    pub convert_url: Option<UrlConverter>,
    pub src_attribs: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            convert_url: None,
            src_attribs: DEFAULT_SRC_ATTRIBS.iter().map(|s| s.to_string()).collect(),
            cwd: None,
        }
    }
}

impl ImageOptions {
    pub fn with_convert_url<F>(mut self, convert_url: F) -> Self
    where
        F: Fn(&str, ElementRef<'_>) -> String + Send + Sync + 'static,
    {
        let convert_url: UrlConverter = Arc::new(convert_url);
        self.convert_url = Some(convert_url);
        self
    }
}

impl From<&ProcessOptions> for ImageOptions {
    fn from(options: &ProcessOptions) -> Self {
        Self {
            convert_url: options.convert_url.clone(),
            src_attribs: options.src_attribs.clone(),
            cwd: options.cwd.clone(),
        }
    }
}

pub struct ExtractedImages {
    pub images: Vec<ImageDescriptor>,
    pub document: ImageDocument,
}

#[derive(Debug, Default)]
struct NodeRewrite {
    values: BTreeMap<String, String>,
    original: BTreeMap<String, String>,
}

/// The parsed html together with the source rewrites applied to its images.
pub struct ImageDocument {
    html: Html,
    rewrites: HashMap<NodeId, NodeRewrite>,
}

/// Read view of one `<img>` element of an [`ImageDocument`].
pub struct ImageNode<'a> {
    element: ElementRef<'a>,
    rewrite: Option<&'a NodeRewrite>,
}

impl<'a> ImageNode<'a> {
    /// Current attribute value, after any rewrite.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.rewrite
            .and_then(|r| r.values.get(name))
            .map(String::as_str)
            .or_else(|| self.element.value().attr(name))
    }

    /// Value an attribute had before it was rewritten.
    pub fn original(&self, name: &str) -> Option<&'a str> {
        self.rewrite
            .and_then(|r| r.original.get(name))
            .map(String::as_str)
    }
}

impl ImageDocument {
    pub fn is_modified(&self) -> bool {
        !self.rewrites.is_empty()
    }

    /// Every `<img>` element in document order.
    pub fn image_nodes(&self) -> Vec<ImageNode<'_>> {
        let Ok(selector) = Selector::parse("img") else {
            return Vec::new();
        };
        self.html
            .select(&selector)
            .map(|element| ImageNode {
                element,
                rewrite: self.rewrites.get(&element.id()),
            })
            .collect()
    }

    /// Serializes the fragment back to html, rewritten attributes included.
    pub fn html(&self) -> String {
        let mut out = String::new();
        for child in self.html.root_element().children() {
            write_node(child, &self.rewrites, &mut out, false);
        }
        out
    }
}

/// Builds the ordered, de-duplicated image inventory of an html fragment.
///
/// Malformed markup never fails; it just yields fewer images.
pub fn extract_images(html: &str, options: &ImageOptions) -> ExtractedImages {
    let document = Html::parse_fragment(html);
    let mut images: Vec<ImageDescriptor> = Vec::new();
    let mut rewrites = HashMap::new();
    let cwd = options.cwd.clone().unwrap_or_else(|| PathBuf::from("."));

    if let Ok(selector) = Selector::parse("img") {
        for element in document.select(&selector) {
            let rewrite = rewrite_sources(element, options);
            let node = ImageNode {
                element,
                rewrite: Some(&rewrite),
            };
            let descriptor = describe(&node, &options.src_attribs, &cwd);
            if !images.iter().any(|image| image.id == descriptor.id) {
                images.push(descriptor);
            }
            if !rewrite.values.is_empty() {
                rewrites.insert(element.id(), rewrite);
            }
        }
    }

    // Stable: featured images first, document order otherwise.
    images.sort_by_key(|image| !image.is_featured());

    ExtractedImages {
        images,
        document: ImageDocument {
            html: document,
            rewrites,
        },
    }
}

fn rewrite_sources(element: ElementRef<'_>, options: &ImageOptions) -> NodeRewrite {
    let mut rewrite = NodeRewrite::default();
    let Some(convert_url) = options.convert_url.as_ref() else {
        return rewrite;
    };
    for attrib in &options.src_attribs {
        let Some(value) = element.value().attr(attrib).filter(|v| !v.is_empty()) else {
            continue;
        };
        rewrite.original.insert(attrib.clone(), value.to_string());
        rewrite
            .values
            .insert(attrib.clone(), convert_url(value, element));
    }
    rewrite
}

fn describe(node: &ImageNode<'_>, src_attribs: &[String], cwd: &Path) -> ImageDescriptor {
    let truthy = |name: &str| node.attr(name).filter(|v| !v.is_empty());

    let mut selector = String::from("img");
    if let Some(id) = truthy("id") {
        selector.push('#');
        selector.push_str(id);
    }

    let classes = truthy("class").and_then(|class| {
        let mut classes: Vec<String> = class.split_whitespace().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        (!classes.is_empty()).then_some(classes)
    });
    if let Some(classes) = &classes {
        selector.push('.');
        selector.push_str(&classes.join("."));
    }

    let src = src_attribs
        .iter()
        .find_map(|attrib| truthy(attrib))
        .map(str::to_string);
    let simple_src = src.as_deref().map(|src| simple_src(cwd, src));
    let id = truthy("data-id")
        .map(str::to_string)
        .or_else(|| src.clone())
        .unwrap_or_else(|| selector.clone());

    ImageDescriptor {
        id,
        src,
        kind: "img".to_string(),
        classes,
        selector,
        simple_src,
    }
}

fn simple_src(cwd: &Path, src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }
    let resolved = paths::resolve(cwd, Path::new(src));
    paths::to_slash(&paths::relative(cwd, &resolved))
}

fn write_node(
    node: NodeRef<'_, Node>,
    rewrites: &HashMap<NodeId, NodeRewrite>,
    out: &mut String,
    raw_text: bool,
) {
    match node.value() {
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            out.push('>');
        }
        Node::Element(element) => {
            let name = element.name();
            let rewrite = rewrites.get(&node.id());
            out.push('<');
            out.push_str(name);
            for (attr, value) in element.attrs() {
                let value = rewrite
                    .and_then(|r| r.values.get(attr))
                    .map_or(value, String::as_str);
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&name) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&name);
            for child in node.children() {
                write_node(child, rewrites, out, raw);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        _ => {
            for child in node.children() {
                write_node(child, rewrites, out, raw_text);
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}
