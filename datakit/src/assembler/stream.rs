use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project_lite::pin_project;

use crate::assembler::EventAssembler;
use crate::error::DataKitResult;
use crate::types::Row;

pin_project! {
    /// Stream of enriched rows, created by [`EventAssembler::stream`].
    ///
    /// Errors from the underlying stream are passed through unchanged.
    #[must_use = "streams do nothing unless polled"]
    pub struct AssembledStream<S> {
        #[pin]
        rows: S,
        assembler: EventAssembler,
    }
}

impl<S> AssembledStream<S> {
    pub(crate) fn new(rows: S, assembler: EventAssembler) -> Self {
        Self { rows, assembler }
    }
}

impl<S> Stream for AssembledStream<S>
where
    S: Stream<Item = DataKitResult<Row>>,
{
    type Item = DataKitResult<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let next = ready!(this.rows.poll_next(cx));

        Poll::Ready(next.map(|row| row.and_then(|row| this.assembler.assemble_one(row))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
