#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Finalizers run synchronously on whichever thread drops the last strong handle.

mod key;
mod referent;

pub use key::Key;
pub use referent::{Referent, Rooted, WeakRef};

#[doc = include_str!("../README.md")]
mod readme {}
