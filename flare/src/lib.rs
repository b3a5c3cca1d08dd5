#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Signals are [`Send`] and [`Sync`]. Receivers are called on the sending thread, without any lock held.
//!
//! Cleanup of dropped receivers and senders happens on whichever thread drops them,
//! or, if that thread is busy inside the same signal, with the next operation on it.

mod error;
mod namespace;
mod raw;
mod receiver;
mod receiver_connected;
mod sender;
mod signal;

pub use error::{BoxError, Error, Result};
pub use namespace::{default_namespace, signal, Namespace};
pub use receiver::{Callback, Receiver, ReceiverId};
pub use receiver_connected::{receiver_connected, ListenerResult, ReceiverConnected};
pub use sender::{Sender, SenderId};
pub use signal::{ReceiversFor, Signal, Strength, WeakSignal};

pub use tether::{Key, Referent};

#[doc = include_str!("../README.md")]
mod readme {}
