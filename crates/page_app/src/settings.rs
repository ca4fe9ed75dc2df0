//! RON settings file for the `page` command.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use page_engine::{ExcerptOptions, ProcessOptions, SlugOptions, Value};
use serde::Deserialize;

use crate::logging::LogDestination;
use crate::markdown::markdown_compiler;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineSettings {
    /// Default attributes merged under every page's front matter.
    pub data: BTreeMap<String, serde_json::Value>,
    pub root: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub images: bool,
    pub markdown: bool,
    pub src_attribs: Option<Vec<String>>,
    pub is_text: Option<bool>,
    /// Prepended to every derived link.
    pub link_prefix: Option<String>,
    /// Prepended to every relative image source.
    pub image_prefix: Option<String>,
    pub slug: SlugSettings,
    pub excerpt: Option<ExcerptSettings>,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlugSettings {
    pub replacement: String,
    pub lower: bool,
}

impl Default for SlugSettings {
    fn default() -> Self {
        let defaults = SlugOptions::default();
        Self {
            replacement: defaults.replacement,
            lower: defaults.lower,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExcerptSettings {
    pub prune_length: usize,
    pub omission: String,
}

impl Default for ExcerptSettings {
    fn default() -> Self {
        let defaults = ExcerptOptions::default();
        Self {
            prune_length: defaults.prune_length,
            omission: defaults.omission,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogSettings {
    pub destination: LogDestination,
    pub file: Option<PathBuf>,
    pub verbose: bool,
}

impl PipelineSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn to_options(&self) -> ProcessOptions {
        let mut options = ProcessOptions::new()
            .with_images(self.images)
            .with_is_text(self.is_text)
            .with_slug(SlugOptions {
                replacement: self.slug.replacement.clone(),
                lower: self.slug.lower,
            });
        options.data = self
            .data
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_json(value.clone())))
            .collect();
        if let Some(root) = &self.root {
            options = options.with_root(root);
        }
        if let Some(cwd) = &self.cwd {
            options = options.with_cwd(cwd);
        }
        if let Some(attribs) = &self.src_attribs {
            options = options.with_src_attribs(attribs.iter().cloned());
        }
        if let Some(excerpt) = &self.excerpt {
            options = options.with_excerpt(ExcerptOptions {
                prune_length: excerpt.prune_length,
                omission: excerpt.omission.clone(),
            });
        }
        if let Some(prefix) = self.link_prefix.clone() {
            options = options.with_link_it(move |link| join_prefix(&prefix, link));
        }
        if let Some(prefix) = self.image_prefix.clone() {
            options = options.with_convert_url(move |src, _| {
                if is_remote(src) || src.starts_with('/') {
                    src.to_string()
                } else {
                    join_prefix(&prefix, src)
                }
            });
        }
        if self.markdown {
            options = options.with_compiler(markdown_compiler());
        }
        options
    }
}

fn join_prefix(prefix: &str, value: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        value.trim_start_matches('/')
    )
}

fn is_remote(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//")
}
