//! Invocation of the caller's compiler and the work that follows it.
//!
//! A compiler is either synchronous (returns the new context) or
//! asynchronous (hands the new context to a [`Completion`] later, possibly
//! from another thread). Both end up as one awaited result.
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use page_logging::{page_debug, page_warn};
use tokio::sync::oneshot;

use crate::images::{extract_images, ImageOptions};
use crate::options::ProcessOptions;
use crate::sink::ProgressSink;
use crate::types::{BoxError, PageRecord, PipelineEvent, ProcessError, Stage};

pub type CompileResult = Result<CompilerContext, BoxError>;

type SyncCompileFn = dyn Fn(CompilerContext) -> CompileResult + Send + Sync;
type AsyncCompileFn = dyn Fn(CompilerContext, Completion) + Send + Sync;

/// What a compiler receives and hands back.
#[derive(Debug, Clone)]
pub struct CompilerContext {
    pub options: Arc<ProcessOptions>,
    pub data: PageRecord,
}

#[derive(Clone)]
pub enum Compiler {
    Sync(Arc<SyncCompileFn>),
    Async(Arc<AsyncCompileFn>),
}

impl Compiler {
    pub fn sync<F>(compile: F) -> Self
    where
        F: Fn(CompilerContext) -> CompileResult + Send + Sync + 'static,
    {
        Compiler::Sync(Arc::new(compile))
    }

    /// The compiler must call [`Completion::done`] exactly once.
    pub fn asynchronous<F>(compile: F) -> Self
    where
        F: Fn(CompilerContext, Completion) + Send + Sync + 'static,
    {
        Compiler::Async(Arc::new(compile))
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compiler::Sync(_) => f.write_str("Compiler::Sync"),
            Compiler::Async(_) => f.write_str("Compiler::Async"),
        }
    }
}

struct CompletionInner {
    fired: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<CompileResult>>>,
}

/// One-shot completion handle given to asynchronous compilers.
///
/// Clones share the same gate: the first `done` wins and later calls are
/// logged and dropped. Dropping every clone without calling `done` fails
/// the run with [`ProcessError::CompilerAbandoned`].
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    fn channel() -> (Self, oneshot::Receiver<CompileResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            inner: Arc::new(CompletionInner {
                fired: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
            }),
        };
        (completion, rx)
    }

    pub fn done(&self, result: CompileResult) {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            page_warn!("compiler signalled completion more than once; ignoring");
            return;
        }
        let sender = self
            .inner
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = sender {
            let _ = tx.send(result);
        }
    }

    pub fn is_done(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }
}

/// Runs the configured compiler, if any, over `context`.
pub(crate) async fn invoke_compiler(
    context: CompilerContext,
) -> Result<CompilerContext, ProcessError> {
    let Some(compiler) = context.options.compiler.clone() else {
        return Ok(context);
    };

    match compiler {
        Compiler::Sync(compile) => {
            match panic::catch_unwind(AssertUnwindSafe(|| compile(context))) {
                Ok(result) => result.map_err(ProcessError::Compiler),
                Err(payload) => Err(ProcessError::CompilerPanicked(panic_message(payload))),
            }
        }
        Compiler::Async(compile) => {
            let (completion, mut rx) = Completion::channel();
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| compile(context, completion)))
            {
                // A signal that made it out before the panic still counts.
                return match rx.try_recv() {
                    Ok(result) => result.map_err(ProcessError::Compiler),
                    Err(_) => Err(ProcessError::CompilerPanicked(panic_message(payload))),
                };
            }
            match rx.await {
                Ok(result) => result.map_err(ProcessError::Compiler),
                Err(_) => Err(ProcessError::CompilerAbandoned),
            }
        }
    }
}

/// Binds the excerpt defaults and, when requested, extracts images from the
/// compiled html. Image failures never fail the run.
pub(crate) fn post_compile(context: CompilerContext, sink: &dyn ProgressSink) -> PageRecord {
    let CompilerContext { options, mut data } = context;
    data.excerpt_options = options.excerpt.clone().unwrap_or_default();

    if !options.images {
        return data;
    }
    let Some(html) = data.html.clone() else {
        return data;
    };

    sink.emit(PipelineEvent::Progress {
        stage: Stage::Images,
        filepath: data.filepath.clone(),
    });
    let image_options = ImageOptions::from(options.as_ref());
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        let extracted = extract_images(&html, &image_options);
        let rewritten = extracted
            .document
            .is_modified()
            .then(|| extracted.document.html());
        (extracted.images, rewritten)
    }));

    match extracted {
        Ok((images, rewritten)) => {
            page_debug!("extracted {} image(s)", images.len());
            if let Some(rewritten) = rewritten {
                data.html = Some(rewritten);
            }
            data.images = Some(images);
        }
        Err(payload) => {
            page_warn!("image extraction failed: {}", panic_message(payload));
        }
    }
    data
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
