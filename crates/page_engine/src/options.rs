use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use scraper::ElementRef;

use crate::compiler::Compiler;
use crate::excerpt::ExcerptOptions;
use crate::types::FileStat;
use crate::value::{Attributes, Value};

pub const DEFAULT_SRC_ATTRIBS: [&str; 2] = ["data-src", "src"];

/// Rewrites a derived `link`.
pub type LinkTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Rewrites an image source attribute value; receives the `<img>` element.
pub type UrlConverter = Arc<dyn Fn(&str, ElementRef<'_>) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugOptions {
    pub replacement: String,
    pub lower: bool,
}

impl Default for SlugOptions {
    fn default() -> Self {
        Self {
            replacement: "-".to_string(),
            lower: false,
        }
    }
}

/// Per-invocation configuration of the pipeline.
#[derive(Clone)]
pub struct ProcessOptions {
    /// Default attribute values; front matter keys win.
    pub data: Attributes,
    /// Base directory for the relative `path`.
    pub root: Option<PathBuf>,
    pub filepath: Option<PathBuf>,
    /// Pre-supplied file metadata, used instead of a new stat call.
    pub stat: Option<FileStat>,
    pub slug: SlugOptions,
    pub link_it: Option<LinkTransform>,
    pub compiler: Option<Compiler>,
    /// Extract images from the compiled html.
    pub images: bool,
    pub convert_url: Option<UrlConverter>,
    /// Attributes consulted, in order, for an image source.
    pub src_attribs: Vec<String>,
    /// Base for relative image paths; the process working directory when unset.
    pub cwd: Option<PathBuf>,
    /// Forces the text/binary classification.
    pub is_text: Option<bool>,
    /// Default options for [`PageRecord::create_excerpt`](crate::PageRecord::create_excerpt).
    pub excerpt: Option<ExcerptOptions>,
    /// Caller-defined keys, visible to compilers through the context.
    pub extra: Attributes,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            data: Attributes::new(),
            root: None,
            filepath: None,
            stat: None,
            slug: SlugOptions::default(),
            link_it: None,
            compiler: None,
            images: false,
            convert_url: None,
            src_attribs: DEFAULT_SRC_ATTRIBS.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            is_text: None,
            excerpt: None,
            extra: Attributes::new(),
        }
    }
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_filepath(mut self, filepath: impl Into<PathBuf>) -> Self {
        self.filepath = Some(filepath.into());
        self
    }

    pub fn with_stat(mut self, stat: FileStat) -> Self {
        self.stat = Some(stat);
        self
    }

    pub fn with_slug(mut self, slug: SlugOptions) -> Self {
        self.slug = slug;
        self
    }

    pub fn with_link_it<F>(mut self, link_it: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let link_it: LinkTransform = Arc::new(link_it);
        self.link_it = Some(link_it);
        self
    }

    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_images(mut self, images: bool) -> Self {
        self.images = images;
        self
    }

    pub fn with_convert_url<F>(mut self, convert_url: F) -> Self
    where
        F: Fn(&str, ElementRef<'_>) -> String + Send + Sync + 'static,
    {
        let convert_url: UrlConverter = Arc::new(convert_url);
        self.convert_url = Some(convert_url);
        self
    }

    pub fn with_src_attribs<I, S>(mut self, attribs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.src_attribs = attribs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_is_text(mut self, is_text: Option<bool>) -> Self {
        self.is_text = is_text;
        self
    }

    pub fn with_excerpt(mut self, excerpt: ExcerptOptions) -> Self {
        self.excerpt = Some(excerpt);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("data", &self.data)
            .field("root", &self.root)
            .field("filepath", &self.filepath)
            .field("stat", &self.stat)
            .field("slug", &self.slug)
            .field("link_it", &self.link_it.is_some())
            .field("compiler", &self.compiler)
            .field("images", &self.images)
            .field("convert_url", &self.convert_url.is_some())
            .field("src_attribs", &self.src_attribs)
            .field("cwd", &self.cwd)
            .field("is_text", &self.is_text)
            .field("excerpt", &self.excerpt)
            .field("extra", &self.extra)
            .finish()
    }
}
