//! Provider clients and the streaming plumbing they share.

use std::pin::Pin;

use futures::{Stream, StreamExt, stream};

use crate::error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind};

pub mod bedrock_service;
pub mod ollama_service;
pub mod open_ai_service;

/// Stream of generated text fragments. Ends after the provider's completion
/// marker; a transport break or error frame is yielded as the last item.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AiLlmError>> + Send>>;

/// One decoded unit of a provider stream.
pub(crate) enum Frame {
    Text(String),
    /// Keep-alive or role-only chunk.
    Skip,
    Done,
    /// Final fragment that also completes the stream.
    Last(String),
}

/// Turns raw frames (SSE data payloads or NDJSON lines) into a [`TextStream`].
///
/// Enforces the completion marker: a body that ends without it is reported
/// as a stream error, and a completed stream without any text is
/// [`ProviderErrorKind::EmptyChoices`].
pub(crate) fn text_stream<S, T>(
    provider: Provider,
    frames: S,
    parse: fn(T) -> Result<Frame, AiLlmError>,
) -> TextStream
where
    S: Stream<Item = Result<T, AiLlmError>> + Send + 'static,
    T: Send + 'static,
{
    struct State<S> {
        inner: Pin<Box<S>>,
        emitted: usize,
        finished: bool,
    }

    let state = State {
        inner: Box::pin(frames),
        emitted: 0,
        finished: false,
    };

    let out = stream::unfold(state, move |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            match st.inner.next().await {
                Some(Ok(raw)) => match parse(raw) {
                    Ok(Frame::Text(t)) if !t.is_empty() => {
                        st.emitted += 1;
                        return Some((Ok(t), st));
                    }
                    Ok(Frame::Text(_)) | Ok(Frame::Skip) => continue,
                    Ok(Frame::Last(t)) if !t.is_empty() => {
                        st.finished = true;
                        return Some((Ok(t), st));
                    }
                    Ok(Frame::Done) | Ok(Frame::Last(_)) => {
                        st.finished = true;
                        if st.emitted == 0 {
                            return Some((fail(provider, ProviderErrorKind::EmptyChoices), st));
                        }
                        return None;
                    }
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                },
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    let kind =
                        ProviderErrorKind::Stream("body ended before completion marker".into());
                    return Some((fail(provider, kind), st));
                }
            }
        }
    });

    Box::pin(out)
}

fn fail(provider: Provider, kind: ProviderErrorKind) -> Result<String, AiLlmError> {
    Err(ProviderError::new(provider, kind).into())
}
