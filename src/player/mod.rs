//! Playback pipeline: the controller state machine and the decoder and
//! player threads it drives.

pub mod controller;
pub mod decoder;
pub mod events;
pub mod mailbox;
pub mod playback;

pub use controller::{Command, CommandSender, Controller};
pub use decoder::{Decoder, DecoderControl};
pub use events::{Event, EventListener, EventListenerProxy};
pub use mailbox::Mailbox;
pub use playback::{Player, PlayerCallbacks, PlayerControl};
