//! The cold-start watchdog.
//!
//! A freshly deployed backend can take seconds to answer its first request.  The watchdog races
//! that wait against a timer; when the timer wins, the renderer shows a notice and the request
//! carries on untouched.  The notice is shown at most once, and never after the watchdog has
//! been disarmed.

use std::future::Future;
use std::pin::{Pin, pin};
use std::time::Duration;

use tokio::time::Sleep;

use crate::observability::COLD_START_ADVISORIES;
use crate::render::Renderer;

/// How long to wait for the first data before showing the cold-start notice.
pub const DEFAULT_COLD_START_THRESHOLD: Duration = Duration::from_millis(2000);

/// The notice shown when the threshold passes without data.
pub const WAKING_UP_NOTICE: &str = "Waking up servers... This may take a few seconds.";

#[derive(Debug)]
enum State {
    Armed(Pin<Box<Sleep>>),
    Fired,
    Disarmed,
}

/// A one-shot timer that shows a notice if data is slow to arrive.
#[derive(Debug)]
pub struct ColdStartWatchdog {
    state: State,
}

impl ColdStartWatchdog {
    /// Starts the timer.  The deadline is fixed now, not when the watchdog is first polled.
    pub fn arm(threshold: Duration) -> Self {
        Self {
            state: State::Armed(Box::pin(tokio::time::sleep(threshold))),
        }
    }

    /// Returns a watchdog that will never fire.
    pub fn disarmed() -> Self {
        Self {
            state: State::Disarmed,
        }
    }

    /// Awaits `fut`, showing the notice on `renderer` if the deadline passes first.
    ///
    /// Firing does not interrupt `fut`; it keeps running to completion either way.
    pub async fn guard<F: Future>(&mut self, fut: F, renderer: &mut dyn Renderer) -> F::Output {
        let mut fut = pin!(fut);
        if let State::Armed(sleep) = &mut self.state {
            tokio::select! {
                biased;
                output = &mut fut => return output,
                () = sleep.as_mut() => {}
            }
            self.state = State::Fired;
            COLD_START_ADVISORIES.click();
            renderer.print_advisory(WAKING_UP_NOTICE);
        }
        fut.await
    }

    /// Stops the watchdog for good.
    ///
    /// Returns true if the notice was showing, so the caller can clear it.  Later calls return
    /// false.
    pub fn disarm(&mut self) -> bool {
        matches!(
            std::mem::replace(&mut self.state, State::Disarmed),
            State::Fired
        )
    }

    /// Returns true while the timer can still fire.
    pub fn is_armed(&self) -> bool {
        matches!(self.state, State::Armed(_))
    }

    /// Returns true if the notice has been shown and not yet cleared by [`disarm`](Self::disarm).
    pub fn has_fired(&self) -> bool {
        matches!(self.state, State::Fired)
    }
}
