//! Errors returned by [`Signal`](`crate::Signal`) operations.

use thiserror::Error;

use crate::ReceiverId;

/// Boxed error type returned by [`receiver_connected`](`crate::receiver_connected()`) listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias defaulting to [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by [`Signal`](`crate::Signal`).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
	/// More than one sender was passed to [`Signal::send_from`](`crate::Signal::send_from`).
	#[error("send accepts at most one sender, {given} given")]
	InvalidArgument {
		/// How many senders were passed.
		given: usize,
	},

	/// A weak connection was requested for a receiver that can't be observed weakly.
	#[error("receiver {receiver:?} can't be weakly referenced")]
	Unweakreferenceable {
		/// The offending receiver.
		receiver: ReceiverId,
	},

	/// A [`receiver_connected`](`crate::receiver_connected()`) listener failed. The connection was rolled back.
	#[error("connection rejected by a receiver_connected listener: {source}")]
	Rejected {
		/// The listener's error.
		#[source]
		source: BoxError,
	},
}

impl Error {
	/// Returns a short stable label (snake_case) for use in logs.
	///
	/// ```
	/// use flare::Error;
	///
	/// assert_eq!(Error::InvalidArgument { given: 2 }.as_label(), "invalid_argument");
	/// ```
	#[must_use]
	pub fn as_label(&self) -> &'static str {
		match self {
			Error::InvalidArgument { .. } => "invalid_argument",
			Error::Unweakreferenceable { .. } => "unweakreferenceable",
			Error::Rejected { .. } => "rejected",
		}
	}
}
