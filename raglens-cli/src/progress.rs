//! Terminal progress bar for evaluation runs.

use indicatif::{ProgressBar, ProgressStyle};
use raglens_core::progress::{NoopProgress, ProgressSink, TracingProgress};
use std::io::IsTerminal;
use std::sync::Mutex;

const TEMPLATE: &str = "{msg} [{bar:40}] {pos}/{len} ({elapsed})";

/// [`ProgressSink`] drawing an `indicatif` bar on stderr.
#[derive(Default)]
pub struct IndicatifProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock()
            && let Some(bar) = guard.as_ref()
        {
            f(bar);
        }
    }
}

impl ProgressSink for IndicatifProgress {
    fn begin(&self, label: &str, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(label.to_string());
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn advance(&self, current: usize, _total: usize) {
        self.with_bar(|bar| bar.set_position(current as u64));
    }

    fn finish(&self) {
        self.with_bar(|bar| bar.finish());
    }
}

/// Pick a sink: nothing when quiet, a bar on a terminal, log events otherwise.
pub fn sink_for(quiet: bool) -> Box<dyn ProgressSink> {
    if quiet {
        Box::new(NoopProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(IndicatifProgress::new())
    } else {
        Box::new(TracingProgress::default())
    }
}
