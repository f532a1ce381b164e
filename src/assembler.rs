//! Turns a stream of events into one reply.
//!
//! Chunks are handed to the renderer as they arrive and accumulated in order.  The renderer's
//! `finish_response` is called exactly once, and only when the stream ends with `Done`.  An
//! error event, a transport failure, a premature end of stream and a cancellation all end the
//! reply without it.

use std::time::Instant;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    STREAM_CHUNKS, STREAM_DURATION, STREAM_ERRORS, STREAM_EVENTS, STREAM_TTFE,
};
use crate::render::Renderer;
use crate::types::{AssembledResponse, StreamEvent};
use crate::watchdog::ColdStartWatchdog;

/// What to do after an event has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep reading.
    Continue,
    /// The reply is complete.
    Done,
}

/// Accumulates the chunks of one reply.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    response: AssembledResponse,
    finished: bool,
}

impl ResponseAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event.
    ///
    /// Events that arrive after a terminal event are ignored.
    pub fn accept(&mut self, event: StreamEvent, renderer: &mut dyn Renderer) -> Result<Step> {
        if self.finished {
            return Ok(Step::Done);
        }
        match event {
            StreamEvent::Chunk { text } => {
                STREAM_CHUNKS.click();
                renderer.print_text(&text);
                self.response.text.push_str(&text);
                self.response.chunks.push(text);
                Ok(Step::Continue)
            }
            StreamEvent::Done => {
                self.finished = true;
                renderer.finish_response();
                Ok(Step::Done)
            }
            StreamEvent::Error { detail } => {
                self.finished = true;
                STREAM_ERRORS.click();
                Err(Error::streaming("Server returned an error", detail))
            }
        }
    }

    /// The text accumulated so far.
    pub fn partial(&self) -> &AssembledResponse {
        &self.response
    }

    /// Returns true once a terminal event has been accepted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consumes the assembler, returning what it accumulated.
    pub fn into_response(self) -> AssembledResponse {
        self.response
    }
}

enum Next {
    Cancelled,
    Item(Option<Result<StreamEvent>>),
}

/// Reads `events` to the end and returns the assembled reply.
///
/// The watchdog guards every wait until the first event arrives and is disarmed as soon as
/// anything happens.  The stream is dropped before this returns, on every path.
///
/// # Examples
///
/// ```
/// # tokio_test::block_on(async {
/// use futures::stream;
/// use tokio_util::sync::CancellationToken;
/// use ctf_client::{ColdStartWatchdog, RecordingRenderer, StreamEvent, assemble};
///
/// let events = stream::iter(vec![Ok(StreamEvent::chunk("Hi")), Ok(StreamEvent::Done)]);
/// let mut renderer = RecordingRenderer::new();
/// let response = assemble(
///     events,
///     &mut renderer,
///     &mut ColdStartWatchdog::disarmed(),
///     &CancellationToken::new(),
///     None,
/// )
/// .await
/// .unwrap();
/// assert_eq!(response.text, "Hi");
/// # });
/// ```
pub async fn assemble<S>(
    mut events: S,
    renderer: &mut dyn Renderer,
    watchdog: &mut ColdStartWatchdog,
    cancel: &CancellationToken,
    logger: Option<&dyn ClientLogger>,
) -> Result<AssembledResponse>
where
    S: Stream<Item = Result<StreamEvent>> + Unpin,
{
    let start = Instant::now();
    let mut assembler = ResponseAssembler::new();
    let mut seen_first = false;

    let result = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => Next::Cancelled,
            item = watchdog.guard(events.next(), renderer) => Next::Item(item),
        };
        if watchdog.disarm() {
            renderer.clear_advisory();
        }

        let event = match next {
            Next::Cancelled => {
                renderer.print_interrupted();
                break Err(Error::abort("reply cancelled"));
            }
            Next::Item(None) => {
                break Err(Error::connection(
                    "event stream ended before the reply was complete",
                    None,
                ));
            }
            Next::Item(Some(Err(err))) => break Err(err),
            Next::Item(Some(Ok(event))) => event,
        };

        STREAM_EVENTS.click();
        if !seen_first {
            seen_first = true;
            STREAM_TTFE.add(start.elapsed().as_secs_f64());
        }
        if let Some(logger) = logger {
            logger.log_stream_event(&event);
        }
        match assembler.accept(event, renderer) {
            Ok(Step::Continue) => {}
            Ok(Step::Done) => break Ok(assembler.into_response()),
            Err(err) => break Err(err),
        }
    };
    drop(events);
    STREAM_DURATION.add(start.elapsed().as_secs_f64());

    if let (Ok(response), Some(logger)) = (&result, logger) {
        logger.log_stream_message(response);
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::render::{RecordingRenderer, RenderEvent};
    use crate::types::{CommandResult, SessionInfo};
    use crate::watchdog::WAKING_UP_NOTICE;

    fn events(items: Vec<Result<StreamEvent>>) -> impl Stream<Item = Result<StreamEvent>> + Unpin {
        stream::iter(items)
    }

    fn finished(renderer: &RecordingRenderer) -> usize {
        renderer.count(|e| matches!(e, RenderEvent::Finished))
    }

    #[derive(Default)]
    struct CollectingLogger {
        events: Mutex<Vec<StreamEvent>>,
        messages: Mutex<Vec<AssembledResponse>>,
    }

    impl ClientLogger for CollectingLogger {
        fn log_session(&self, _: &SessionInfo) {}

        fn log_command_result(&self, _: &CommandResult) {}

        fn log_stream_event(&self, event: &StreamEvent) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn log_stream_message(&self, response: &AssembledResponse) {
            self.messages.lock().unwrap().push(response.clone());
        }
    }

    #[tokio::test]
    async fn chunks_assemble_in_order() {
        let mut renderer = RecordingRenderer::new();
        let mut watchdog = ColdStartWatchdog::disarmed();
        let logger = CollectingLogger::default();
        let response = assemble(
            events(vec![
                Ok(StreamEvent::chunk("He")),
                Ok(StreamEvent::chunk("llo")),
                Ok(StreamEvent::Done),
            ]),
            &mut renderer,
            &mut watchdog,
            &CancellationToken::new(),
            Some(&logger),
        )
        .await
        .unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(response.chunk_count(), 2);
        assert_eq!(
            renderer.events(),
            &[
                RenderEvent::Text("He".to_string()),
                RenderEvent::Text("llo".to_string()),
                RenderEvent::Finished,
            ]
        );
        assert_eq!(logger.events.lock().unwrap().len(), 3);
        assert_eq!(logger.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nothing_after_done_is_rendered() {
        let mut renderer = RecordingRenderer::new();
        let response = assemble(
            events(vec![
                Ok(StreamEvent::chunk("A")),
                Ok(StreamEvent::Done),
                Ok(StreamEvent::chunk("B")),
                Ok(StreamEvent::Done),
            ]),
            &mut renderer,
            &mut ColdStartWatchdog::disarmed(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(response.text, "A");
        assert_eq!(renderer.text(), "A");
        assert_eq!(finished(&renderer), 1);
    }

    #[tokio::test]
    async fn error_event_keeps_partial_output_and_never_finishes() {
        let mut renderer = RecordingRenderer::new();
        let logger = CollectingLogger::default();
        let err = assemble(
            events(vec![
                Ok(StreamEvent::chunk("Par")),
                Ok(StreamEvent::Error {
                    detail: Some("model overloaded".to_string()),
                }),
                Ok(StreamEvent::chunk("tial")),
            ]),
            &mut renderer,
            &mut ColdStartWatchdog::disarmed(),
            &CancellationToken::new(),
            Some(&logger),
        )
        .await
        .unwrap_err();
        assert!(err.is_streaming());
        assert!(err.to_string().contains("model overloaded"));
        assert_eq!(renderer.text(), "Par");
        assert_eq!(finished(&renderer), 0);
        assert!(logger.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn premature_end_is_a_connection_error() {
        let mut renderer = RecordingRenderer::new();
        let err = assemble(
            events(vec![Ok(StreamEvent::chunk("cut"))]),
            &mut renderer,
            &mut ColdStartWatchdog::disarmed(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_transport_failure());
        assert_eq!(finished(&renderer), 0);
    }

    #[tokio::test]
    async fn transport_error_is_passed_through() {
        let mut renderer = RecordingRenderer::new();
        let err = assemble(
            events(vec![
                Ok(StreamEvent::chunk("x")),
                Err(Error::connection("reset by peer", None)),
            ]),
            &mut renderer,
            &mut ColdStartWatchdog::disarmed(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_a_stalled_stream() {
        let mut renderer = RecordingRenderer::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = assemble(
            stream::pending::<Result<StreamEvent>>(),
            &mut renderer,
            &mut ColdStartWatchdog::disarmed(),
            &cancel,
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(renderer.events(), &[RenderEvent::Interrupted]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_first_event_shows_and_clears_notice() {
        let mut renderer = RecordingRenderer::new();
        let mut watchdog = ColdStartWatchdog::arm(Duration::from_millis(2000));
        let slow = Box::pin(
            stream::once(async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok::<_, Error>(StreamEvent::chunk("late"))
            })
            .chain(stream::iter(vec![Ok(StreamEvent::Done)])),
        );
        let response = assemble(
            slow,
            &mut renderer,
            &mut watchdog,
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(response.text, "late");
        assert_eq!(
            renderer.events(),
            &[
                RenderEvent::Advisory(WAKING_UP_NOTICE.to_string()),
                RenderEvent::AdvisoryCleared,
                RenderEvent::Text("late".to_string()),
                RenderEvent::Finished,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fast_first_event_shows_no_notice() {
        let mut renderer = RecordingRenderer::new();
        let mut watchdog = ColdStartWatchdog::arm(Duration::from_millis(2000));
        assemble(
            events(vec![Ok(StreamEvent::chunk("hi")), Ok(StreamEvent::Done)]),
            &mut renderer,
            &mut watchdog,
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            renderer.count(|e| matches!(e, RenderEvent::Advisory(_))),
            0
        );
        assert!(!watchdog.is_armed());
    }
}
