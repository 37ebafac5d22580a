//! A console progress bar counting completed replicates.
//!
//! Only one progress bar can be active at a time; starting a new batch replaces the previous bar.
//! Workers call [`increment_replicate_progress`] from any thread.

use progress_bar::{
    finalize_progress_bar, inc_progress_bar, init_progress_bar, set_progress_bar_action, Color,
    Style,
};

use crate::log::trace;

/// Starts a progress bar for a batch of `replicates`.
pub fn init_replicate_progress_bar(replicates: usize) {
    trace!("initializing replicate progress bar for {replicates} replicates");
    init_progress_bar(replicates);
    set_progress_bar_action("Replicates", Color::Blue, Style::Bold);
}

/// Records one finished replicate, successful or not.
pub fn increment_replicate_progress() {
    inc_progress_bar();
}

pub fn finalize_replicate_progress() {
    finalize_progress_bar();
}
