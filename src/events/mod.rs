//! # Events Module
//!
//! Structured decision events for capture and tail-trimming runs.
//!
//! ## Design
//! The core library emits one event per decision (page classified, recovery
//! probe resolved, tail pair checked, file removed) through a channel. The CLI
//! turns them into progress output; tests assert on them directly instead of
//! parsing log text.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! let mut guard = CaptureGuard::new(config, Comparator::default(), output_dir, sender)?;
//! guard.step(&mut actuator)?;
//!
//! for event in receiver.drain() {
//!     if let Event::Capture(CaptureEvent::PageCaptured(decision)) = event {
//!         println!("page {} duplicate={}", decision.page, decision.is_duplicate());
//!     }
//! }
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
