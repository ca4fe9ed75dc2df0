use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::excerpt::ExcerptOptions;
use crate::frontmatter::FrontMatterError;
use crate::images::ImageDescriptor;
use crate::value::{Attributes, Timestamp, Value};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalizing,
    FrontMatter,
    Defaults,
    Compiling,
    Images,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Progress {
        stage: Stage,
        filepath: Option<PathBuf>,
    },
    Failed {
        filepath: Option<PathBuf>,
        message: String,
    },
}

/// File metadata consulted for the date fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStat {
    pub modified: Option<Timestamp>,
    pub len: u64,
}

impl FileStat {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified = metadata
            .modified()
            .ok()
            .map(|time| DateTime::<Local>::from(time).fixed_offset());
        Self {
            modified,
            len: metadata.len(),
        }
    }
}

/// Content left after the front matter was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Bytes),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Text(String::new())
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Body::Text(text) => serializer.serialize_str(text),
            Body::Binary(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}

/// The normalized page produced by one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub attributes: Attributes,
    pub body: Body,
    pub published: bool,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<FileStat>,
    pub is_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageDescriptor>>,
    #[serde(skip)]
    pub(crate) excerpt_options: ExcerptOptions,
}

impl PageRecord {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            body: Body::default(),
            published: true,
            categories: Vec::new(),
            filepath: None,
            path: None,
            dir: None,
            date: None,
            slug: None,
            link: None,
            stat: None,
            is_text: true,
            html: None,
            images: None,
            excerpt_options: ExcerptOptions::default(),
        }
    }

    /// Looks up a front matter (or defaulted) attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("No data given to process.")]
    NoData,
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("input stream failed: {0}")]
    Stream(#[source] BoxError),
    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),
    /// The compiler's own error; displays verbatim.
    #[error("{0}")]
    Compiler(#[source] BoxError),
    #[error("compiler panicked: {0}")]
    CompilerPanicked(String),
    #[error("compiler dropped its completion without signalling")]
    CompilerAbandoned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalizing => "normalizing",
            Stage::FrontMatter => "front matter",
            Stage::Defaults => "defaults",
            Stage::Compiling => "compiling",
            Stage::Images => "images",
            Stage::Done => "done",
        };
        write!(f, "{name}")
    }
}
