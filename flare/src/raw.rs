//! The receiver registry behind [`Signal`](`crate::Signal`).
//!
//! [`Registry`] only deals in identities. It never drops handles itself: anything it evicts
//! goes into its [`Trash`], which the owner empties after releasing its borrow, since
//! dropping a handle may run finalizers that re-enter the signal.

use std::{
	any::Any,
	collections::{HashMap, HashSet},
	mem,
};

use ahash::RandomState;
use tether::WeakRef;
use tracing::debug;

use crate::{
	receiver::{Receiver, WeakReceiver},
	ReceiverId, SenderId,
};

pub(crate) enum Handle<A: ?Sized + 'static, R: 'static> {
	Strong(Receiver<A, R>),
	Weak(WeakReceiver<A, R>),
}

impl<A: ?Sized + 'static, R: 'static> Handle<A, R> {
	pub(crate) fn id(&self) -> ReceiverId {
		match self {
			Handle::Strong(strong) => strong.id(),
			Handle::Weak(weak) => weak.id(),
		}
	}
}

/// Identities whose weak target was dropped, reported by finalizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Collected {
	Receiver(ReceiverId),
	Sender(SenderId),
}

/// Outcome of resolving a candidate receiver during dispatch.
pub(crate) enum Resolved<A: ?Sized + 'static, R: 'static> {
	Live(Receiver<A, R>),
	/// Already disconnected.
	Missing,
	/// Weakly held and dropped. Disconnected now.
	Dead,
}

pub(crate) struct Trash<A: ?Sized + 'static, R: 'static> {
	handles: Vec<Handle<A, R>>,
	senders: Vec<WeakRef<dyn Any + Send + Sync>>,
}

impl<A: ?Sized + 'static, R: 'static> Default for Trash<A, R> {
	fn default() -> Self {
		Self {
			handles: Vec::new(),
			senders: Vec::new(),
		}
	}
}

pub(crate) struct Registry<A: ?Sized + 'static, R: 'static> {
	receivers: HashMap<ReceiverId, Handle<A, R>, RandomState>,
	/// Note: [`SenderId::Any`] collects receivers connected for every sender.
	by_sender: HashMap<SenderId, HashSet<ReceiverId, RandomState>, RandomState>,
	by_receiver: HashMap<ReceiverId, HashSet<SenderId, RandomState>, RandomState>,
	weak_senders: HashMap<SenderId, WeakRef<dyn Any + Send + Sync>, RandomState>,
	trash: Trash<A, R>,
}

impl<A: ?Sized + 'static, R: 'static> Registry<A, R> {
	pub(crate) fn new() -> Self {
		Self {
			receivers: HashMap::default(),
			by_sender: HashMap::default(),
			by_receiver: HashMap::default(),
			weak_senders: HashMap::default(),
			trash: Trash::default(),
		}
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.receivers.is_empty()
	}

	pub(crate) fn len(&self) -> usize {
		self.receivers.len()
	}

	pub(crate) fn take_trash(&mut self) -> Trash<A, R> {
		mem::take(&mut self.trash)
	}

	/// Stores `handle` unless `receiver` already has one. The first registration wins.
	///
	/// **Returns** whether `handle` was stored.
	pub(crate) fn insert(&mut self, receiver: ReceiverId, handle: Handle<A, R>) -> bool {
		debug_assert_eq!(handle.id(), receiver);
		if self.receivers.contains_key(&receiver) {
			self.trash.handles.push(handle);
			false
		} else {
			self.receivers.insert(receiver, handle);
			self.by_receiver.entry(receiver).or_default();
			true
		}
	}

	pub(crate) fn contains(&self, receiver: ReceiverId) -> bool {
		self.receivers.contains_key(&receiver)
	}

	pub(crate) fn subscribe(&mut self, receiver: ReceiverId, sender: SenderId) {
		self.by_sender
			.entry(sender.clone())
			.or_default()
			.insert(receiver);
		self.by_receiver.entry(receiver).or_default().insert(sender);
	}

	pub(crate) fn is_sender_tracked(&self, sender: &SenderId) -> bool {
		self.weak_senders.contains_key(sender)
	}

	/// Keeps an existing entry for `sender`, if any.
	pub(crate) fn track_sender(&mut self, sender: SenderId, weak: WeakRef<dyn Any + Send + Sync>) {
		debug_assert_ne!(sender, SenderId::Any);
		if self.weak_senders.contains_key(&sender) {
			self.trash.senders.push(weak);
		} else {
			self.weak_senders.insert(sender, weak);
		}
	}

	/// With [`SenderId::Any`], removes `receiver` entirely.
	/// Otherwise, removes only its association with `sender`.
	/// The receiver stays stored even if that was its last association.
	pub(crate) fn disconnect(&mut self, receiver: ReceiverId, sender: &SenderId) {
		if *sender == SenderId::Any {
			self.remove_receiver(receiver);
			return;
		}

		let Some(senders) = self.by_receiver.get_mut(&receiver) else {
			return;
		};
		if senders.remove(sender) {
			self.unlink(receiver, sender);
		}
	}

	/// Undoes a connection of `receiver` for `sender`.
	///
	/// If that connection stored the receiver (`inserted`), it's removed entirely
	/// unless it gained other associations in the meantime.
	pub(crate) fn retract(&mut self, receiver: ReceiverId, sender: &SenderId, inserted: bool) {
		self.disconnect(receiver, sender);
		if inserted
			&& self
				.by_receiver
				.get(&receiver)
				.is_some_and(HashSet::is_empty)
		{
			self.remove_receiver(receiver);
		}
	}

	fn remove_receiver(&mut self, receiver: ReceiverId) {
		if let Some(senders) = self.by_receiver.remove(&receiver) {
			for sender in &senders {
				self.unlink(receiver, sender);
			}
		}
		if let Some(handle) = self.receivers.remove(&receiver) {
			self.trash.handles.push(handle);
		}
	}

	/// Removes `receiver` from `sender`'s bucket.
	/// An emptied bucket is pruned along with the sender's tracking entry.
	fn unlink(&mut self, receiver: ReceiverId, sender: &SenderId) {
		if let Some(bucket) = self.by_sender.get_mut(sender) {
			bucket.remove(&receiver);
			if bucket.is_empty() {
				self.by_sender.remove(sender);
				if let Some(weak) = self.weak_senders.remove(sender) {
					self.trash.senders.push(weak);
				}
			}
		}
	}

	/// Forgets `sender`. Its receivers stay stored, with their other associations.
	pub(crate) fn cleanup_sender(&mut self, sender: &SenderId) {
		debug_assert_ne!(*sender, SenderId::Any);
		if let Some(weak) = self.weak_senders.remove(sender) {
			self.trash.senders.push(weak);
		}
		let Some(bucket) = self.by_sender.remove(sender) else {
			return;
		};
		for receiver in bucket {
			if let Some(senders) = self.by_receiver.get_mut(&receiver) {
				senders.remove(sender);
			}
		}
	}

	pub(crate) fn collect(&mut self, collected: Collected) {
		match collected {
			Collected::Receiver(receiver) => {
				if self.contains(receiver) {
					debug!(?receiver, "disconnecting collected receiver");
					self.disconnect(receiver, &SenderId::Any);
				}
			}
			Collected::Sender(sender) => {
				if self.is_sender_tracked(&sender) {
					debug!(?sender, "forgetting collected sender");
					self.cleanup_sender(&sender);
				}
			}
		}
	}

	/// Receivers to notify for `sender`: those connected for it, and those connected for any sender.
	pub(crate) fn candidates(&self, sender: &SenderId) -> Vec<ReceiverId> {
		let any = self.by_sender.get(&SenderId::Any);
		let specific = match sender {
			SenderId::Any => None,
			sender => self.by_sender.get(sender),
		};
		let mut candidates: Vec<_> = any.into_iter().flatten().copied().collect();
		if let Some(specific) = specific {
			candidates.extend(
				specific
					.iter()
					.copied()
					.filter(|receiver| any.map_or(true, |any| !any.contains(receiver))),
			);
		}
		candidates
	}

	pub(crate) fn resolve(&mut self, receiver: ReceiverId) -> Resolved<A, R> {
		let upgraded = match self.receivers.get(&receiver) {
			None => return Resolved::Missing,
			Some(Handle::Strong(strong)) => return Resolved::Live(strong.clone()),
			Some(Handle::Weak(weak)) => weak.upgrade(),
		};
		if let Some(live) = upgraded {
			Resolved::Live(live)
		} else {
			debug!(?receiver, "disconnecting dropped receiver");
			self.disconnect(receiver, &SenderId::Any);
			Resolved::Dead
		}
	}

	/// Optimistic: doesn't check whether weakly held receivers are still alive.
	pub(crate) fn has_receivers_for(&self, sender: &SenderId) -> bool {
		if self.receivers.is_empty() {
			return false;
		}
		if self.by_sender.contains_key(&SenderId::Any) {
			return true;
		}
		match sender {
			SenderId::Any => false,
			sender => self.by_sender.contains_key(sender),
		}
	}

	/// Moves all state into the trash.
	#[cfg(any(test, feature = "_test"))]
	pub(crate) fn clear(&mut self) {
		self.trash
			.handles
			.extend(self.receivers.drain().map(|(_, handle)| handle));
		self.trash
			.senders
			.extend(self.weak_senders.drain().map(|(_, weak)| weak));
		self.by_sender.clear();
		self.by_receiver.clear();
	}

	#[cfg(test)]
	pub(crate) fn senders_of(&self, receiver: ReceiverId) -> HashSet<SenderId> {
		self.by_receiver
			.get(&receiver)
			.map(|senders| senders.iter().cloned().collect())
			.unwrap_or_default()
	}

	#[cfg(test)]
	pub(crate) fn receivers_of(&self, sender: &SenderId) -> HashSet<ReceiverId> {
		self.by_sender
			.get(sender)
			.map(|receivers| receivers.iter().copied().collect())
			.unwrap_or_default()
	}

	#[cfg(test)]
	pub(crate) fn tracked_senders(&self) -> usize {
		self.weak_senders.len()
	}

	/// Panics unless the indices mirror each other.
	///
	/// A stored receiver may have no associations left after partial disconnects.
	#[cfg(test)]
	pub(crate) fn assert_consistent(&self) {
		for (receiver, senders) in &self.by_receiver {
			assert!(self.receivers.contains_key(receiver), "{receiver:?} indexed but not stored");
			for sender in senders {
				assert!(
					self.by_sender
						.get(sender)
						.is_some_and(|bucket| bucket.contains(receiver)),
					"{receiver:?} lists {sender:?}, but isn't in its bucket",
				);
			}
		}
		for (sender, bucket) in &self.by_sender {
			assert!(!bucket.is_empty(), "empty bucket for {sender:?}");
			for receiver in bucket {
				assert!(
					self.by_receiver
						.get(receiver)
						.is_some_and(|senders| senders.contains(sender)),
					"{sender:?} lists {receiver:?}, but not the reverse",
				);
			}
		}
		for receiver in self.receivers.keys() {
			assert!(self.by_receiver.contains_key(receiver), "{receiver:?} stored but not indexed");
		}
	}
}
