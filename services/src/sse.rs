//! Incremental decoding of `text/event-stream` and newline-delimited bodies.
//!
//! Network chunks do not respect line or UTF-8 boundaries, so both decoders
//! buffer raw bytes and only decode complete lines.

use std::collections::VecDeque;

use futures::{Stream, StreamExt, stream};

/// Terminal data payload used by OpenAI-compatible streams.
pub const DONE_MARKER: &str = "[DONE]";

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the last `event:` field, if any.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }
}

/// Splits a byte stream into lines without the trailing `\r\n` / `\n`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
        Some(line)
    }
}

/// Stateful SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let lines = self.lines.push(chunk);
        lines
            .into_iter()
            .filter_map(|line| self.feed_line(&line))
            .collect()
    }

    /// Flushes an event left open when the stream ended without a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if let Some(line) = self.lines.finish() {
            if let Some(ev) = self.feed_line(&line) {
                return Some(ev);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: self.event.take(),
            data,
        })
    }
}

/// Adapts a byte-chunk stream (e.g. `reqwest::Response::bytes_stream`) into
/// a stream of SSE events.
pub fn sse_events<S, B, E>(body: S) -> impl Stream<Item = Result<SseEvent, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    decode_with(body, SseDecoder::new(), |d, c| d.push(c), |d| d.finish())
}

/// Adapts a byte-chunk stream into non-empty lines (NDJSON bodies).
pub fn ndjson_lines<S, B, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    decode_with(
        body,
        LineBuffer::default(),
        |d, c| {
            d.push(c)
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect()
        },
        |d| d.finish().filter(|l| !l.trim().is_empty()),
    )
}

fn decode_with<S, B, E, D, T>(
    body: S,
    decoder: D,
    push: fn(&mut D, &[u8]) -> Vec<T>,
    finish: fn(&mut D) -> Option<T>,
) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    struct State<S, D, T> {
        inner: std::pin::Pin<Box<S>>,
        decoder: D,
        queue: VecDeque<T>,
        ended: bool,
    }

    let state = State {
        inner: Box::pin(body),
        decoder,
        queue: VecDeque::new(),
        ended: false,
    };

    stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(item) = st.queue.pop_front() {
                return Some((Ok(item), st));
            }
            if st.ended {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let items = push(&mut st.decoder, chunk.as_ref());
                    st.queue.extend(items);
                }
                Some(Err(e)) => {
                    st.ended = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.ended = true;
                    if let Some(item) = finish(&mut st.decoder) {
                        st.queue.push_back(item);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: {\"a\"").is_empty());
        let evs = d.push(b":1}\n\ndata: [DONE]\n\n");
        assert_eq!(evs.len(), 2);
        assert_eq!(evs[0].data, "{\"a\":1}");
        assert!(evs[1].is_done());
    }

    #[test]
    fn keeps_event_name_and_joins_multiline_data() {
        let mut d = SseDecoder::new();
        let evs = d.push(b"event: error\r\ndata: line1\r\ndata: line2\r\n\r\n");
        assert_eq!(
            evs,
            vec![SseEvent {
                event: Some("error".into()),
                data: "line1\nline2".into()
            }]
        );
    }

    #[test]
    fn ignores_comments_and_flushes_unterminated_tail() {
        let mut d = SseDecoder::new();
        assert!(d.push(b": keep-alive\n\ndata: tail").is_empty());
        assert_eq!(d.finish().map(|e| e.data), Some("tail".to_string()));
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let bytes = "data: héllo\n\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut d = SseDecoder::new();
        assert!(d.push(&bytes[..split]).is_empty());
        let evs = d.push(&bytes[split..]);
        assert_eq!(evs[0].data, "héllo");
    }

    #[test]
    fn stream_adapters_yield_events_and_lines() {
        let chunks: Vec<Result<&[u8], ()>> = vec![Ok(b"data: a\n"), Ok(b"\ndata: b\n\n")];
        let events: Vec<_> = block_on(sse_events(stream::iter(chunks)).collect());
        let data: Vec<_> = events.into_iter().map(|e| e.unwrap().data).collect();
        assert_eq!(data, vec!["a", "b"]);

        let chunks: Vec<Result<&[u8], ()>> = vec![Ok(b"{\"x\":1}\n\n{\"x\""), Ok(b":2}")];
        let lines: Vec<_> = block_on(ndjson_lines(stream::iter(chunks)).collect());
        let lines: Vec<_> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(lines, vec!["{\"x\":1}", "{\"x\":2}"]);
    }
}
