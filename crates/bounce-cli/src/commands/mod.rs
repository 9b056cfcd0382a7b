//! CLI subcommands.

pub mod render;
pub mod render_midi;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A flag flipped by Ctrl-C so a render can be abandoned cleanly.
pub(crate) fn cancel_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler = flag.clone();
    if let Err(error) = ctrlc::set_handler(move || handler.store(true, Ordering::SeqCst)) {
        tracing::warn!(%error, "could not install Ctrl-C handler");
    }
    flag
}
