//! Page engine: front matter, attribute defaults, compilation and image
//! extraction for static-site content.
mod compiler;
mod date;
mod decode;
mod defaults;
mod excerpt;
mod frontmatter;
mod images;
mod options;
mod paths;
mod pipeline;
mod sink;
mod slug;
mod stat;
mod stream;
mod types;
mod value;

pub use compiler::{CompileResult, Compiler, CompilerContext, Completion};
pub use date::{date_from_str, parse_date_str, parse_yaml_timestamp};
pub use decode::{decode_text, DecodedText, HeuristicClassifier, TextClassifier};
pub use defaults::apply_defaults;
pub use excerpt::{create_excerpt, ExcerptOptions};
pub use frontmatter::{FrontMatterError, FrontMatterParser, ParsedFrontMatter, YamlFrontMatter};
pub use images::{extract_images, ExtractedImages, ImageDescriptor, ImageDocument, ImageNode, ImageOptions};
pub use options::{LinkTransform, ProcessOptions, SlugOptions, UrlConverter, DEFAULT_SRC_ATTRIBS};
pub use pipeline::{process, process_file, Pipeline, RawInput};
pub use sink::{ChannelProgressSink, NoopProgressSink, ProgressSink};
pub use slug::{prepare_path_for_slug, slugify};
pub use stat::{StatProvider, TokioStat};
pub use stream::{byte_stream, collect_chunks, transform, ByteStream};
pub use types::{
    Body, BoxError, FileStat, PageRecord, PipelineEvent, ProcessError, Stage,
};
pub use value::{attributes_from_json, Attributes, Timestamp, Value};
