use std::io::Write;

use fluente_core::tutor::PENDING_TRANSLATION;
use fluente_core::{Correction, RenderSink, StreamFailure};

/// Prints tutor replies to the terminal as they stream in
#[derive(Debug, Default)]
pub struct StdoutSink {
    started: bool,
}

impl RenderSink for StdoutSink {
    fn on_correction(&mut self, correction: Option<&Correction>) {
        self.started = false;
        if let Some(correction) = correction {
            println!("  ✎ {} ({})", correction.corrected, correction.translation);
        }
    }

    fn on_chunk(&mut self, text: &str) {
        if !self.started {
            print!("tutor: ");
            self.started = true;
        }
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn on_translation(&mut self, text: &str) {
        let text = if text.is_empty() { PENDING_TRANSLATION } else { text };
        println!("\n       {text}");
    }

    fn on_stream_error(&mut self, error: &StreamFailure) {
        if self.started {
            println!();
        }
        eprintln!("The tutor could not answer: {error}");
    }
}
