//! Async Stream support for record decoding

use crate::streaming_sse::{RecordDecoder, StreamRecord};
use bytes::Bytes;
use futures_core::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Adapter that turns a byte stream into a stream of [`StreamRecord`]s.
///
/// Transport errors are forwarded in place; decoding resumes with the next
/// packet. Pending data is flushed when the inner stream ends.
pub struct RecordStream<S> {
    inner: S,
    decoder: RecordDecoder,
    pending: VecDeque<StreamRecord>,
    finished: bool,
}

impl<S> RecordStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            decoder: RecordDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for RecordStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<StreamRecord, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(record) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(record)));
            }
            if this.finished {
                return Poll::Ready(None);
            }
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending.extend(this.decoder.push(&chunk));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    this.finished = true;
                    this.pending.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extension trait for byte streams to easily convert to record streams
pub trait RecordStreamExt: Stream {
    fn into_record_stream(self) -> RecordStream<Self>
    where
        Self: Sized,
    {
        RecordStream::new(self)
    }
}

impl<S: Stream> RecordStreamExt for S {}
