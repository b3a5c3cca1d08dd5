use std::{
	any::Any,
	fmt::{self, Debug, Formatter},
};

use once_cell::sync::Lazy;

use crate::{BoxError, Receiver, ReceiverId, Sender, Signal, Strength};

/// What a [`receiver_connected()`] listener returns. An [`Err`] rejects the connection.
pub type ListenerResult = Result<(), BoxError>;

static RECEIVER_CONNECTED: Lazy<Signal<ReceiverConnected, ListenerResult>> = Lazy::new(|| {
	Signal::named_with_doc(
		"receiver_connected",
		"Sent by each signal, as sender, after a receiver is connected to it.",
	)
});

/// The process-wide signal announcing new connections on every other [`Signal`].
///
/// The signal that gained a receiver is the sender, so listeners can connect for one signal only:
///
/// ```
/// use flare::{receiver_connected, ListenerResult, Receiver, ReceiverConnected, Sender, Signal};
/// use std::sync::{Arc, Mutex};
///
/// let signal = Signal::<str>::named("watched");
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let listener = Receiver::new({
/// 	let seen = Arc::clone(&seen);
/// 	move |_: &Sender, event: &ReceiverConnected| -> ListenerResult {
/// 		seen.lock().unwrap().push(event.receiver_id());
/// 		Ok(())
/// 	}
/// });
/// receiver_connected().connect_to(&listener, &signal).unwrap();
///
/// let receiver = Receiver::new(|_: &Sender, _: &str| ());
/// signal.connect(&receiver).unwrap();
/// assert_eq!(*seen.lock().unwrap(), [receiver.id()]);
/// # receiver_connected().disconnect(&listener);
/// ```
///
/// Connecting to [`receiver_connected()`] itself isn't announced.
pub fn receiver_connected() -> &'static Signal<ReceiverConnected, ListenerResult> {
	&RECEIVER_CONNECTED
}

/// Payload of [`receiver_connected()`].
pub struct ReceiverConnected {
	signal: Sender,
	receiver_id: ReceiverId,
	receiver: Box<dyn Any + Send + Sync>,
	sender: Sender,
	strength: Strength,
}

impl ReceiverConnected {
	pub(crate) fn new<A: ?Sized + 'static, R: 'static>(
		signal: &Signal<A, R>,
		receiver: &Receiver<A, R>,
		sender: &Sender,
		strength: Strength,
	) -> Self {
		Self {
			signal: signal.into(),
			receiver_id: receiver.id(),
			receiver: Box::new(receiver.clone()),
			sender: sender.clone(),
			strength,
		}
	}

	/// The signal that was connected to, as [`Sender`].
	///
	/// This is also the sender of the [`receiver_connected()`] emission.
	#[must_use]
	pub fn signal(&self) -> &Sender {
		&self.signal
	}

	/// The new receiver's identity.
	#[must_use]
	pub fn receiver_id(&self) -> ReceiverId {
		self.receiver_id
	}

	/// The new receiver, if it has this type.
	#[must_use]
	pub fn receiver<A: ?Sized + 'static, R: 'static>(&self) -> Option<&Receiver<A, R>> {
		self.receiver.downcast_ref()
	}

	/// The sender the receiver was connected for. May be [`Sender::ANY`].
	#[must_use]
	pub fn sender(&self) -> &Sender {
		&self.sender
	}

	/// The requested [`Strength`].
	///
	/// Note that a receiver that was already connected keeps its original strength.
	#[must_use]
	pub fn strength(&self) -> Strength {
		self.strength
	}
}

impl Debug for ReceiverConnected {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReceiverConnected")
			.field("signal", &self.signal)
			.field("receiver", &self.receiver_id)
			.field("sender", &self.sender)
			.field("strength", &self.strength)
			.finish()
	}
}
