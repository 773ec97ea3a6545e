use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::dispatch::{DispatchProgress, ProgressObserver};

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} geocoded ({eta})";

/// Terminal bar for a geocoding run. Its length is filled in by the first
/// progress report.
pub fn geocoding_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

/// Advances `bar` by one for every completed item.
pub fn bar_observer(bar: ProgressBar) -> ProgressObserver {
    Arc::new(move |progress: DispatchProgress| {
        bar.set_length(progress.total as u64);
        bar.inc(1);
    })
}
