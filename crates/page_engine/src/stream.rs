use std::pin::pin;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use page_logging::page_trace;

use crate::pipeline::{Pipeline, RawInput};
use crate::types::{BoxError, PageRecord, ProcessError};

pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Boxes any chunk stream whose items convert into bytes.
pub fn byte_stream<S, B, E>(input: S) -> ByteStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    input
        .map(|chunk| chunk.map(Into::into).map_err(Into::into))
        .boxed()
}

/// Buffers every chunk until the stream ends and concatenates them.
///
/// The first stream error ends collection; nothing after it is polled.
pub async fn collect_chunks<S, B, E>(input: S) -> Result<Bytes, ProcessError>
where
    S: Stream<Item = Result<B, E>>,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    let mut input = pin!(input);
    let mut chunks: Vec<Bytes> = Vec::new();
    while let Some(chunk) = input.next().await {
        let chunk = chunk.map_err(|err| ProcessError::Stream(err.into()))?;
        chunks.push(chunk.into());
    }
    page_trace!("collected {} chunk(s)", chunks.len());
    Ok(concat(chunks))
}

fn concat(mut chunks: Vec<Bytes>) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.remove(0),
        _ => {
            let total = chunks.iter().map(Bytes::len).sum();
            let mut buffer = BytesMut::with_capacity(total);
            for chunk in &chunks {
                buffer.extend_from_slice(chunk);
            }
            buffer.freeze()
        }
    }
}

/// Single-object transform: consumes a byte stream and yields exactly one
/// processed record (or the first error).
pub fn transform<S, B, E>(
    pipeline: Pipeline,
    input: S,
) -> impl Stream<Item = Result<PageRecord, ProcessError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Into<Bytes> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    stream::once(async move { pipeline.process(RawInput::from_stream(input)).await })
}
