//! Output rendering for chat replies.
//!
//! A [`Renderer`] is the sink a reply is streamed into.  It is passed explicitly to every call
//! that produces output, so there is no shared "current message" anywhere in the client.

use std::io::{self, Stdout, Write};

use crate::types::Stage;

/// ANSI escape code for dim text (used for advisories).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for advisories).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for system notices).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for bold text (used for stage banners).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a chunk of reply text.
    ///
    /// This is called once per chunk, in arrival order, as the reply streams in.
    fn print_text(&mut self, text: &str);

    /// Called exactly once when a streamed reply completes successfully.
    fn finish_response(&mut self);

    /// Show a transient notice, such as the cold-start warning.
    fn print_advisory(&mut self, notice: &str);

    /// Remove the transient notice, if one is showing.
    fn clear_advisory(&mut self);

    /// Print an informational message from the server or the client.
    fn print_info(&mut self, info: &str);

    /// Announce the stage the session is on.
    fn print_stage(&mut self, stage: Stage);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Called when the reply is cancelled by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    advisory_showing: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            advisory_showing: false,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        println!();
        self.flush();
    }

    fn print_advisory(&mut self, notice: &str) {
        self.advisory_showing = true;
        if self.use_color {
            print!("{ANSI_DIM}{ANSI_ITALIC}[{notice}]{ANSI_RESET}");
        } else {
            print!("[{notice}]");
        }
        self.flush();
    }

    fn clear_advisory(&mut self) {
        if self.advisory_showing {
            self.advisory_showing = false;
            println!();
            self.flush();
        }
    }

    fn print_info(&mut self, info: &str) {
        if self.use_color {
            println!("{ANSI_CYAN}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    fn print_stage(&mut self, stage: Stage) {
        if self.use_color {
            println!("{ANSI_BOLD}{stage}{ANSI_RESET}");
        } else {
            println!("{stage}");
        }
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            eprintln!("\n{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("\nError: {error}");
        }
    }

    fn print_interrupted(&mut self) {
        println!("\n[interrupted]");
        self.flush();
    }
}

/// Something a [`RecordingRenderer`] was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// A chunk of reply text.
    Text(String),
    /// The reply finished.
    Finished,
    /// A transient notice was shown.
    Advisory(String),
    /// The transient notice was removed.
    AdvisoryCleared,
    /// An informational message.
    Info(String),
    /// A stage announcement.
    Stage(Stage),
    /// An error message.
    Error(String),
    /// The reply was cancelled.
    Interrupted,
}

/// A renderer that records everything it is asked to show.
///
/// Useful for headless front ends that redraw from a model rather than a terminal.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    events: Vec<RenderEvent>,
}

impl RecordingRenderer {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything recorded so far, in order.
    pub fn events(&self) -> &[RenderEvent] {
        &self.events
    }

    /// Returns the reply text recorded so far.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&RenderEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}

impl Renderer for RecordingRenderer {
    fn print_text(&mut self, text: &str) {
        self.events.push(RenderEvent::Text(text.to_string()));
    }

    fn finish_response(&mut self) {
        self.events.push(RenderEvent::Finished);
    }

    fn print_advisory(&mut self, notice: &str) {
        self.events.push(RenderEvent::Advisory(notice.to_string()));
    }

    fn clear_advisory(&mut self) {
        self.events.push(RenderEvent::AdvisoryCleared);
    }

    fn print_info(&mut self, info: &str) {
        self.events.push(RenderEvent::Info(info.to_string()));
    }

    fn print_stage(&mut self, stage: Stage) {
        self.events.push(RenderEvent::Stage(stage));
    }

    fn print_error(&mut self, error: &str) {
        self.events.push(RenderEvent::Error(error.to_string()));
    }

    fn print_interrupted(&mut self) {
        self.events.push(RenderEvent::Interrupted);
    }
}
