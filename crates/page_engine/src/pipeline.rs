use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use page_logging::{page_debug, page_trace};
use tokio_util::io::ReaderStream;

use crate::compiler::{invoke_compiler, post_compile, CompilerContext};
use crate::decode::{decode_text, HeuristicClassifier, TextClassifier};
use crate::defaults::apply_defaults;
use crate::frontmatter::{FrontMatterParser, YamlFrontMatter};
use crate::options::ProcessOptions;
use crate::sink::{NoopProgressSink, ProgressSink};
use crate::stat::{StatProvider, TokioStat};
use crate::stream::{byte_stream, collect_chunks, ByteStream};
use crate::types::{BoxError, Body, PageRecord, PipelineEvent, ProcessError, Stage};
use crate::value::Attributes;

type Thunk = Box<dyn FnOnce(&ProcessOptions) -> RawInput + Send>;

/// Everything the pipeline accepts as page source.
pub enum RawInput {
    Text(String),
    Bytes(Bytes),
    /// Produces the real input once the options are known.
    Thunk(Thunk),
    Stream(ByteStream),
    Missing,
}

impl RawInput {
    /// Text input from any value with a display form.
    pub fn display(value: impl fmt::Display) -> Self {
        RawInput::Text(value.to_string())
    }

    pub fn thunk<F>(produce: F) -> Self
    where
        F: FnOnce(&ProcessOptions) -> RawInput + Send + 'static,
    {
        RawInput::Thunk(Box::new(produce))
    }

    pub fn from_stream<S, B, E>(input: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError>,
    {
        RawInput::Stream(byte_stream(input))
    }
}

impl fmt::Debug for RawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawInput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RawInput::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            RawInput::Thunk(_) => f.write_str("Thunk"),
            RawInput::Stream(_) => f.write_str("Stream"),
            RawInput::Missing => f.write_str("Missing"),
        }
    }
}

impl From<&str> for RawInput {
    fn from(value: &str) -> Self {
        RawInput::Text(value.to_string())
    }
}

impl From<String> for RawInput {
    fn from(value: String) -> Self {
        RawInput::Text(value)
    }
}

impl From<&[u8]> for RawInput {
    fn from(value: &[u8]) -> Self {
        RawInput::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for RawInput {
    fn from(value: Vec<u8>) -> Self {
        RawInput::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for RawInput {
    fn from(value: Bytes) -> Self {
        RawInput::Bytes(value)
    }
}

impl<T: Into<RawInput>> From<Option<T>> for RawInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawInput::Missing, Into::into)
    }
}

enum Normalized {
    Text(String),
    Bytes(Bytes),
}

/// The content pipeline with its collaborators.
///
/// Cloning is cheap; every collaborator is shared.
#[derive(Clone)]
pub struct Pipeline {
    options: Arc<ProcessOptions>,
    front_matter: Arc<dyn FrontMatterParser>,
    classifier: Arc<dyn TextClassifier>,
    stat: Arc<dyn StatProvider>,
    sink: Arc<dyn ProgressSink>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(ProcessOptions::default())
    }
}

impl Pipeline {
    pub fn new(options: ProcessOptions) -> Self {
        Self {
            options: Arc::new(options),
            front_matter: Arc::new(YamlFrontMatter),
            classifier: Arc::new(HeuristicClassifier::default()),
            stat: Arc::new(TokioStat),
            sink: Arc::new(NoopProgressSink),
        }
    }

    pub fn with_front_matter(mut self, parser: impl FrontMatterParser + 'static) -> Self {
        self.front_matter = Arc::new(parser);
        self
    }

    pub fn with_classifier(mut self, classifier: impl TextClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_stat_provider(mut self, stat: impl StatProvider + 'static) -> Self {
        self.stat = Arc::new(stat);
        self
    }

    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Normalizes `raw` into a finished page record.
    pub async fn process(&self, raw: impl Into<RawInput>) -> Result<PageRecord, ProcessError> {
        let result = self.run(raw.into()).await;
        self.report(result)
    }

    /// Callback flavour of [`Pipeline::process`]; `on_done` runs exactly once.
    pub async fn process_with<F>(&self, raw: impl Into<RawInput>, on_done: F)
    where
        F: FnOnce(Result<PageRecord, ProcessError>),
    {
        on_done(self.process(raw).await);
    }

    /// Reads `path` through the stream adapter with `filepath` preset to it.
    pub async fn process_file(&self, path: impl AsRef<Path>) -> Result<PageRecord, ProcessError> {
        let path = path.as_ref().to_path_buf();
        let mut options = (*self.options).clone();
        options.filepath = Some(path.clone());
        let pipeline = Pipeline {
            options: Arc::new(options),
            ..self.clone()
        };

        pipeline.emit(Stage::Normalizing);
        let result = match tokio::fs::File::open(&path).await {
            Ok(file) => {
                let chunks = ReaderStream::new(file).map_err(|source| ProcessError::Io {
                    path: path.clone(),
                    source,
                });
                match collect_chunks(chunks).await {
                    Ok(bytes) => pipeline.process_collected(bytes).await,
                    Err(err) => Err(flatten_read_error(err)),
                }
            }
            Err(source) => Err(ProcessError::Io { path, source }),
        };
        pipeline.report(result)
    }

    /// Steps shared by every input once it is a single in-memory buffer.
    async fn process_collected(&self, bytes: Bytes) -> Result<PageRecord, ProcessError> {
        self.process_normalized(Normalized::Bytes(bytes)).await
    }

    async fn run(&self, mut raw: RawInput) -> Result<PageRecord, ProcessError> {
        self.emit(Stage::Normalizing);
        let normalized = loop {
            match raw {
                RawInput::Thunk(produce) => raw = produce(&self.options),
                RawInput::Stream(input) => {
                    let bytes = collect_chunks(input).await?;
                    return self.process_collected(bytes).await;
                }
                RawInput::Missing => return Err(ProcessError::NoData),
                RawInput::Text(text) => break Normalized::Text(text),
                RawInput::Bytes(bytes) => break Normalized::Bytes(bytes),
            }
        };
        self.process_normalized(normalized).await
    }

    async fn process_normalized(&self, input: Normalized) -> Result<PageRecord, ProcessError> {
        let is_text = match (self.options.is_text, &input) {
            (Some(forced), _) => forced,
            (None, Normalized::Text(_)) => true,
            (None, Normalized::Bytes(bytes)) => self.classifier.is_text(bytes),
        };
        page_trace!("input classified as {}", if is_text { "text" } else { "binary" });

        let (attributes, body) = if is_text {
            self.emit(Stage::FrontMatter);
            let text = match input {
                Normalized::Text(text) => text,
                Normalized::Bytes(bytes) => decode_text(&bytes).text,
            };
            let parsed = self.front_matter.parse(&text)?;
            (parsed.attributes, Body::Text(parsed.body))
        } else {
            let bytes = match input {
                Normalized::Text(text) => Bytes::from(text),
                Normalized::Bytes(bytes) => bytes,
            };
            (Attributes::new(), Body::Binary(bytes))
        };

        self.emit(Stage::Defaults);
        let mut record = apply_defaults(attributes, &self.options, self.stat.as_ref()).await;
        record.body = body;
        record.is_text = is_text;

        self.emit(Stage::Compiling);
        let context = invoke_compiler(CompilerContext {
            options: self.options.clone(),
            data: record,
        })
        .await?;
        let record = post_compile(context, self.sink.as_ref());

        self.emit(Stage::Done);
        Ok(record)
    }

    fn emit(&self, stage: Stage) {
        self.sink.emit(PipelineEvent::Progress {
            stage,
            filepath: self.options.filepath.clone(),
        });
    }

    fn report(
        &self,
        result: Result<PageRecord, ProcessError>,
    ) -> Result<PageRecord, ProcessError> {
        if let Err(err) = &result {
            page_debug!("processing failed: {}", err);
            self.sink.emit(PipelineEvent::Failed {
                filepath: self.options.filepath.clone(),
                message: err.to_string(),
            });
        }
        result
    }
}

/// Read errors arrive wrapped as stream errors; surface them as I/O errors.
fn flatten_read_error(err: ProcessError) -> ProcessError {
    match err {
        ProcessError::Stream(source) => match source.downcast::<ProcessError>() {
            Ok(inner) => *inner,
            Err(source) => ProcessError::Stream(source),
        },
        other => other,
    }
}

/// Processes `raw` with `options` and the default collaborators.
pub async fn process(
    raw: impl Into<RawInput>,
    options: ProcessOptions,
) -> Result<PageRecord, ProcessError> {
    Pipeline::new(options).process(raw).await
}

/// Processes the file at `path` with `options` and the default collaborators.
pub async fn process_file(
    path: impl Into<PathBuf>,
    options: ProcessOptions,
) -> Result<PageRecord, ProcessError> {
    Pipeline::new(options).process_file(path.into()).await
}
