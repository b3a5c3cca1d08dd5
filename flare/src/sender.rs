use std::{
	any::Any,
	fmt::{self, Debug, Formatter},
	hash::Hash,
};

use tether::{Key, Referent, WeakRef};

/// What a [`Signal`](`crate::Signal`) emission is attributed to.
///
/// Receivers can be connected for one specific sender or for [`Sender::ANY`].
#[derive(Clone)]
pub struct Sender(Repr);

#[derive(Clone)]
enum Repr {
	Any,
	None,
	Object(Referent<dyn Any + Send + Sync>),
	Key(Key),
}

/// The identity a [`Sender`] is indexed by.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SenderId {
	/// Matches every sender. Only [`Sender::ANY`] has this identity.
	Any,
	/// [`Sender::NONE`].
	None,
	/// A shared object, by address.
	Address(usize),
	/// A plain value, by value.
	Key(Key),
}

impl Sender {
	/// Used when connecting or disconnecting: stands for every sender.
	pub const ANY: Self = Self(Repr::Any);

	/// The neutral sender. It's matched like any other specific sender.
	pub const NONE: Self = Self(Repr::None);

	/// A shared object as sender. It's tracked weakly once connected to.
	#[must_use]
	pub fn object<T: Any + Send + Sync>(object: &Referent<T>) -> Self {
		Self(Repr::Object(object.to_any()))
	}

	/// A type-erased shared object as sender.
	#[must_use]
	pub fn erased(object: Referent<dyn Any + Send + Sync>) -> Self {
		Self(Repr::Object(object))
	}

	/// A plain value as sender, identified by equality.
	///
	/// Such senders can't be observed weakly, so connections to them are never cleaned up automatically.
	pub fn key<T: Hash + Eq + Debug + Send + Sync + 'static>(value: T) -> Self {
		Self(Repr::Key(Key::new(value)))
	}

	/// The identity this sender is matched by.
	#[must_use]
	pub fn id(&self) -> SenderId {
		match &self.0 {
			Repr::Any => SenderId::Any,
			Repr::None => SenderId::None,
			Repr::Object(object) => SenderId::Address(object.address()),
			Repr::Key(key) => SenderId::Key(key.clone()),
		}
	}

	/// Whether this is [`Sender::ANY`].
	#[must_use]
	pub fn is_any(&self) -> bool {
		matches!(self.0, Repr::Any)
	}

	/// Whether this is [`Sender::NONE`].
	#[must_use]
	pub fn is_none(&self) -> bool {
		matches!(self.0, Repr::None)
	}

	/// Borrows the underlying object or key value.
	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match &self.0 {
			Repr::Any | Repr::None => None,
			Repr::Object(object) => object.downcast_ref(),
			Repr::Key(key) => key.downcast_ref(),
		}
	}

	/// The shared object, if this sender is one.
	#[must_use]
	pub fn as_object(&self) -> Option<&Referent<dyn Any + Send + Sync>> {
		match &self.0 {
			Repr::Object(object) => Some(object),
			_ => None,
		}
	}

	/// Tracks this sender weakly, if it supports that.
	pub(crate) fn downgrade_with(
		&self,
		finalizer: impl 'static + Send + FnOnce(),
	) -> Option<WeakRef<dyn Any + Send + Sync>> {
		self.as_object()
			.map(|object| object.downgrade_with(finalizer))
	}
}

impl Default for Sender {
	fn default() -> Self {
		Self::NONE
	}
}

impl<T: Any + Send + Sync> From<&Referent<T>> for Sender {
	fn from(object: &Referent<T>) -> Self {
		Self::object(object)
	}
}

impl From<&Sender> for Sender {
	fn from(sender: &Sender) -> Self {
		sender.clone()
	}
}

impl PartialEq for Sender {
	fn eq(&self, other: &Self) -> bool {
		self.id() == other.id()
	}
}

impl Eq for Sender {}

impl Debug for Sender {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.0 {
			Repr::Any => f.write_str("ANY"),
			Repr::None => f.write_str("NONE"),
			Repr::Object(object) => f
				.debug_tuple("Object")
				.field(&format_args!("{:#x}", object.address()))
				.finish(),
			Repr::Key(key) => Debug::fmt(key, f),
		}
	}
}

impl Debug for SenderId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			SenderId::Any => f.write_str("ANY"),
			SenderId::None => f.write_str("NONE"),
			SenderId::Address(address) => write!(f, "Address({address:#x})"),
			SenderId::Key(key) => Debug::fmt(key, f),
		}
	}
}
