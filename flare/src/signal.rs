use std::{
	borrow::Cow,
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	mem,
	vec,
};

use parking_lot::{Mutex, ReentrantMutex};
use scopeguard::{guard, guard_on_unwind, ScopeGuard};
use tether::{Referent, WeakRef};
use tracing::{debug, trace};

use crate::{
	raw::{Collected, Handle, Registry, Resolved},
	receiver_connected, Error, Receiver, ReceiverConnected, ReceiverId, Sender,
};

/// How a [`Signal`] holds on to a connected receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strength {
	/// The receiver is disconnected automatically once it's dropped everywhere else.
	#[default]
	Weak,
	/// The signal keeps the receiver alive until it's disconnected.
	Strong,
}

/// A synchronous multicast event source.
///
/// `A` is the payload passed to each receiver by reference, `R` what each receiver returns.
/// Clones share the same receiver registry.
///
/// ```
/// use flare::{Receiver, Sender, Signal};
///
/// let signal = Signal::<i32, i32>::new();
/// let double = Receiver::new(|_sender: &Sender, x: &i32| x * 2);
/// signal.connect(&double).unwrap();
///
/// let results = signal.send(Sender::NONE, &21);
/// assert_eq!(results, [(double.clone(), 42)]);
///
/// // Results hold on to their receivers too.
/// drop((results, double));
/// assert!(signal.send(Sender::NONE, &21).is_empty());
/// ```
///
/// # Threading
///
/// Receivers are called without any lock held. They may connect and disconnect
/// receivers on the same signal while it's dispatching: a receiver disconnected
/// before its turn is skipped, and one connected during dispatch isn't called by it.
pub struct Signal<A: ?Sized + 'static, R: 'static = ()> {
	core: Referent<Core<A, R>>,
}

/// A weak handle to a [`Signal`].
pub struct WeakSignal<A: ?Sized + 'static, R: 'static = ()> {
	core: WeakRef<Core<A, R>>,
}

struct Core<A: ?Sized + 'static, R: 'static> {
	name: Option<Cow<'static, str>>,
	doc: Option<Cow<'static, str>>,
	registry: ReentrantMutex<RefCell<Registry<A, R>>>,
	/// Reported by finalizers that couldn't borrow `registry` right away.
	pending: Mutex<Vec<Collected>>,
}

impl<A: ?Sized + 'static, R: 'static> Core<A, R> {
	/// Runs `f` on the registry, after applying pending collections.
	///
	/// Values evicted by `f` are dropped only after the lock is released.
	fn with_registry<T>(&self, f: impl FnOnce(&mut Registry<A, R>) -> T) -> T {
		let (t, trash) = {
			let lock = self.registry.lock();
			let mut registry = (*lock).borrow_mut();
			self.apply_pending(&mut *registry);
			let t = f(&mut *registry);
			let trash = registry.take_trash();
			(t, trash)
		};
		drop(trash);
		t
	}

	fn apply_pending(&self, registry: &mut Registry<A, R>) {
		let pending = mem::take(&mut *self.pending.lock());
		for collected in pending {
			registry.collect(collected);
		}
	}

	/// Called from finalizers, on whichever thread dropped the receiver or sender.
	fn collected(&self, collected: Collected) {
		self.pending.lock().push(collected);

		let trash = {
			let lock = self.registry.lock();
			let Ok(mut registry) = (*lock).try_borrow_mut() else {
				// Dropped during a registry operation further up this thread's stack.
				// The next operation picks it up.
				return;
			};
			self.apply_pending(&mut *registry);
			registry.take_trash()
		};
		drop(trash);
	}
}

impl<A: ?Sized + 'static, R: 'static> Signal<A, R> {
	/// Creates a new anonymous signal.
	#[must_use]
	pub fn new() -> Self {
		Self::with_meta(None, None)
	}

	/// Creates a new signal with a `name` for diagnostics.
	///
	/// Names aren't unique. Use a [`Namespace`](`crate::Namespace`) to share signals by name.
	#[must_use]
	pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
		Self::with_meta(Some(name.into()), None)
	}

	/// Creates a new anonymous signal with documentation attached.
	#[must_use]
	pub fn with_doc(doc: impl Into<Cow<'static, str>>) -> Self {
		Self::with_meta(None, Some(doc.into()))
	}

	/// Creates a new signal with both a name and documentation.
	#[must_use]
	pub fn named_with_doc(
		name: impl Into<Cow<'static, str>>,
		doc: impl Into<Cow<'static, str>>,
	) -> Self {
		Self::with_meta(Some(name.into()), Some(doc.into()))
	}

	fn with_meta(name: Option<Cow<'static, str>>, doc: Option<Cow<'static, str>>) -> Self {
		Self {
			core: Referent::new(Core {
				name,
				doc,
				registry: ReentrantMutex::new(RefCell::new(Registry::new())),
				pending: Mutex::new(Vec::new()),
			}),
		}
	}

	/// The name given at construction, if any.
	#[must_use]
	pub fn name(&self) -> Option<&str> {
		self.core.name.as_deref()
	}

	/// The documentation given at construction, if any.
	#[must_use]
	pub fn doc(&self) -> Option<&str> {
		self.core.doc.as_deref()
	}

	/// Whether both handles refer to the same signal.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		self.core.ptr_eq(&other.core)
	}

	pub(crate) fn address(&self) -> usize {
		self.core.address()
	}

	/// Creates a [`WeakSignal`] that doesn't keep this signal's receivers alive.
	#[must_use]
	pub fn downgrade(&self) -> WeakSignal<A, R> {
		WeakSignal {
			core: self.core.downgrade(),
		}
	}

	pub(crate) fn downgrade_with(
		&self,
		finalizer: impl 'static + Send + FnOnce(),
	) -> WeakSignal<A, R> {
		WeakSignal {
			core: self.core.downgrade_with(finalizer),
		}
	}

	/// A finalizer that reports `collected` to this signal, if it still exists by then.
	fn finalizer(&self, collected: Collected) -> impl 'static + Send + FnOnce() {
		let core = self.core.downgrade();
		move || {
			if let Some(core) = core.upgrade() {
				core.collected(collected);
			}
		}
	}

	/// Connects `receiver` weakly for any sender.
	///
	/// # Errors
	///
	/// See [`Signal::connect_with`].
	pub fn connect(&self, receiver: &Receiver<A, R>) -> Result<Receiver<A, R>, Error> {
		self.connect_with(receiver, Sender::ANY, Strength::Weak)
	}

	/// Connects `receiver` weakly for `sender` only.
	///
	/// # Errors
	///
	/// See [`Signal::connect_with`].
	pub fn connect_to(
		&self,
		receiver: &Receiver<A, R>,
		sender: impl Into<Sender>,
	) -> Result<Receiver<A, R>, Error> {
		self.connect_with(receiver, sender, Strength::Weak)
	}

	/// Connects `receiver` for `sender`, which can be [`Sender::ANY`].
	///
	/// A receiver that's already connected keeps its original [`Strength`].
	///
	/// Shared-object senders are tracked weakly: once dropped, receivers connected
	/// for them are disconnected from them. Other senders are never cleaned up.
	///
	/// Afterwards, [`receiver_connected()`] is sent with this signal as sender, unless
	/// this signal *is* [`receiver_connected()`].
	///
	/// **Returns** a clone of `receiver`.
	///
	/// # Errors
	///
	/// [`Error::Unweakreferenceable`] if [`Strength::Weak`] was requested for a [`Receiver::function`].
	///
	/// [`Error::Rejected`] if a [`receiver_connected()`] listener failed.
	/// The new connection is removed again in that case.
	///
	/// # Panics
	///
	/// Iff a [`receiver_connected()`] listener panics, after removing the new connection.
	pub fn connect_with(
		&self,
		receiver: &Receiver<A, R>,
		sender: impl Into<Sender>,
		strength: Strength,
	) -> Result<Receiver<A, R>, Error> {
		let sender = sender.into();
		let receiver_id = receiver.id();
		let sender_id = sender.id();

		let handle = match strength {
			Strength::Weak => Handle::Weak(
				receiver.downgrade_with(self.finalizer(Collected::Receiver(receiver_id)))?,
			),
			Strength::Strong => Handle::Strong(receiver.clone()),
		};

		let weak_sender = if sender.is_any()
			|| self
				.core
				.with_registry(|registry| registry.is_sender_tracked(&sender_id))
		{
			None
		} else {
			// Best-effort: keys and `NONE` can't be observed, and aren't tracked.
			sender.downgrade_with(self.finalizer(Collected::Sender(sender_id.clone())))
		};

		let inserted = self.core.with_registry(|registry| {
			let inserted = registry.insert(receiver_id, handle);
			registry.subscribe(receiver_id, sender_id.clone());
			if let Some(weak_sender) = weak_sender {
				registry.track_sender(sender_id, weak_sender);
			}
			inserted
		});
		debug!(signal = ?self.name(), receiver = ?receiver_id, ?sender, ?strength, "connected");

		self.announce(receiver, &sender, strength, inserted)?;
		Ok(receiver.clone())
	}

	/// `inserted` is whether the connection being announced stored `receiver`.
	fn announce(
		&self,
		receiver: &Receiver<A, R>,
		sender: &Sender,
		strength: Strength,
		inserted: bool,
	) -> Result<(), Error> {
		let meta = receiver_connected();
		if self.address() == meta.address() || meta.is_empty() {
			return Ok(());
		}

		let event = ReceiverConnected::new(self, receiver, sender, strength);
		let rollback = guard_on_unwind((), |()| {
			debug!(signal = ?self.name(), receiver = ?receiver.id(), "rolling back after panic");
			self.retract(receiver, sender, inserted);
		});
		let outcome = meta.try_send(self, &event);
		ScopeGuard::into_inner(rollback);

		outcome.map(drop).map_err(|source| {
			debug!(signal = ?self.name(), receiver = ?receiver.id(), %source, "rolling back");
			self.retract(receiver, sender, inserted);
			Error::Rejected { source }
		})
	}

	fn retract(&self, receiver: &Receiver<A, R>, sender: &Sender, inserted: bool) {
		let (receiver_id, sender_id) = (receiver.id(), sender.id());
		self.core
			.with_registry(|registry| registry.retract(receiver_id, &sender_id, inserted));
	}

	/// Connects `receiver` strongly for `sender` while `f` runs.
	///
	/// `receiver` is [disconnected](`Signal::disconnect`) entirely afterwards, even if `f` panics.
	///
	/// # Errors
	///
	/// See [`Signal::connect_with`]. `f` isn't called in that case.
	pub fn connected_to<T>(
		&self,
		receiver: &Receiver<A, R>,
		sender: impl Into<Sender>,
		f: impl FnOnce() -> T,
	) -> Result<T, Error> {
		self.connect_with(receiver, sender, Strength::Strong)?;
		let _connection = guard((), |()| self.disconnect(receiver));
		Ok(f())
	}

	/// Disconnects `receiver` from all senders.
	pub fn disconnect(&self, receiver: &Receiver<A, R>) {
		self.disconnect_from(receiver, Sender::ANY);
	}

	/// Disconnects `receiver` from `sender`.
	///
	/// With [`Sender::ANY`], this disconnects `receiver` entirely.
	/// Otherwise, connections for other senders (including [`Sender::ANY`]) remain,
	/// and `receiver` stays registered (and counted) even without any.
	pub fn disconnect_from(&self, receiver: &Receiver<A, R>, sender: impl Into<Sender>) {
		let sender_id = sender.into().id();
		let receiver_id = receiver.id();
		self.core
			.with_registry(|registry| registry.disconnect(receiver_id, &sender_id));
		debug!(signal = ?self.name(), receiver = ?receiver_id, sender = ?sender_id, "disconnected");
	}

	/// Calls each receiver connected for `sender` or [`Sender::ANY`] with `sender` and `args`.
	///
	/// **Returns** each receiver with its return value, in unspecified order.
	///
	/// A panicking receiver aborts the dispatch; the remaining receivers aren't called.
	pub fn send(&self, sender: impl Into<Sender>, args: &A) -> Vec<(Receiver<A, R>, R)> {
		let sender = sender.into();
		if self.is_empty() {
			return Vec::new();
		}
		trace!(signal = ?self.name(), ?sender, "sending");
		self.receivers_for(&sender)
			.map(|receiver| {
				let result = receiver.call(&sender, args);
				(receiver, result)
			})
			.collect()
	}

	/// [`Signal::send`] on behalf of [`Sender::NONE`].
	pub fn send_anonymous(&self, args: &A) -> Vec<(Receiver<A, R>, R)> {
		self.send(Sender::NONE, args)
	}

	/// [`Signal::send`] on behalf of the only entry in `senders`, or [`Sender::NONE`] if it's empty.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] iff more than one sender is given. No receiver is called then.
	pub fn send_from(
		&self,
		senders: &[Sender],
		args: &A,
	) -> Result<Vec<(Receiver<A, R>, R)>, Error> {
		match senders {
			[] => Ok(self.send_anonymous(args)),
			[sender] => Ok(self.send(sender, args)),
			_ => Err(Error::InvalidArgument {
				given: senders.len(),
			}),
		}
	}

	/// Lazily iterates the live receivers for `sender`.
	///
	/// Which receivers are candidates is fixed when this is called.
	/// Each is looked up again just before it's yielded, which disconnects dropped weak receivers.
	pub fn receivers_for(&self, sender: impl Into<Sender>) -> ReceiversFor<'_, A, R> {
		let sender_id = sender.into().id();
		let candidates = self.core.with_registry(|registry| {
			if registry.is_empty() {
				Vec::new()
			} else {
				registry.candidates(&sender_id)
			}
		});
		ReceiversFor {
			core: &self.core,
			candidates: candidates.into_iter(),
		}
	}

	/// Whether there's *probably* a receiver for `sender`.
	///
	/// This doesn't check whether weakly connected receivers are still alive.
	/// Use [`Signal::receivers_for`] for a definitive answer.
	#[must_use]
	pub fn has_receivers_for(&self, sender: impl Into<Sender>) -> bool {
		let sender_id = sender.into().id();
		self.core
			.with_registry(|registry| registry.has_receivers_for(&sender_id))
	}

	/// The number of connected receivers, including weak ones that were dropped but not cleaned up yet.
	#[must_use]
	pub fn receiver_count(&self) -> usize {
		self.core.with_registry(|registry| registry.len())
	}

	/// Whether no receivers are connected at all.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.core.with_registry(|registry| registry.is_empty())
	}

	/// Throws away all receivers and sender tracking at once.
	#[cfg(any(test, feature = "_test"))]
	pub fn clear_state(&self) {
		self.core.pending.lock().clear();
		self.core.with_registry(Registry::clear);
	}

	#[cfg(test)]
	pub(crate) fn inspect<T>(&self, f: impl FnOnce(&Registry<A, R>) -> T) -> T {
		self.core.with_registry(|registry| f(&*registry))
	}
}

impl<A: ?Sized + 'static, T: 'static, E: 'static> Signal<A, Result<T, E>> {
	/// Like [`Signal::send`], but stops at the first receiver that returns [`Err`].
	///
	/// # Errors
	///
	/// The first [`Err`] returned by a receiver. Later receivers aren't called.
	pub fn try_send(
		&self,
		sender: impl Into<Sender>,
		args: &A,
	) -> Result<Vec<(Receiver<A, Result<T, E>>, T)>, E> {
		let sender = sender.into();
		if self.is_empty() {
			return Ok(Vec::new());
		}
		trace!(signal = ?self.name(), ?sender, "sending");
		self.receivers_for(&sender)
			.map(|receiver| {
				let result = receiver.call(&sender, args)?;
				Ok((receiver, result))
			})
			.collect()
	}
}

impl<A: ?Sized + 'static, R: 'static> Clone for Signal<A, R> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
		}
	}
}

impl<A: ?Sized + 'static, R: 'static> Default for Signal<A, R> {
	fn default() -> Self {
		Self::new()
	}
}

impl<A: ?Sized + 'static, R: 'static> Debug for Signal<A, R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("name", &self.name())
			.field("receivers", &self.receiver_count())
			.finish_non_exhaustive()
	}
}

impl<A: ?Sized + 'static, R: 'static> From<&Signal<A, R>> for Sender {
	fn from(signal: &Signal<A, R>) -> Self {
		Sender::object(&signal.core)
	}
}

impl<A: ?Sized + 'static, R: 'static> WeakSignal<A, R> {
	/// The signal, unless all of its strong handles were dropped.
	#[must_use]
	pub fn upgrade(&self) -> Option<Signal<A, R>> {
		self.core.upgrade().map(|core| Signal { core })
	}

	/// Whether the signal still exists.
	#[must_use]
	pub fn is_alive(&self) -> bool {
		self.core.is_alive()
	}
}

impl<A: ?Sized + 'static, R: 'static> Clone for WeakSignal<A, R> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
		}
	}
}

impl<A: ?Sized + 'static, R: 'static> Debug for WeakSignal<A, R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("WeakSignal").field(&self.core).finish()
	}
}

/// Iterator returned by [`Signal::receivers_for`].
pub struct ReceiversFor<'a, A: ?Sized + 'static, R: 'static> {
	core: &'a Core<A, R>,
	candidates: vec::IntoIter<ReceiverId>,
}

impl<'a, A: ?Sized + 'static, R: 'static> Iterator for ReceiversFor<'a, A, R> {
	type Item = Receiver<A, R>;

	fn next(&mut self) -> Option<Self::Item> {
		for receiver in self.candidates.by_ref() {
			match self.core.with_registry(|registry| registry.resolve(receiver)) {
				Resolved::Live(live) => return Some(live),
				Resolved::Missing | Resolved::Dead => (),
			}
		}
		None
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(0, Some(self.candidates.len()))
	}
}

impl<'a, A: ?Sized + 'static, R: 'static> Debug for ReceiversFor<'a, A, R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReceiversFor")
			.field("remaining", &self.candidates.as_slice())
			.finish()
	}
}
