use std::{
	any::{Any, TypeId},
	fmt::{self, Debug, Formatter},
	hash::{Hash, Hasher},
	sync::Arc,
};

trait DynKey: Any + Send + Sync + Debug {
	fn as_any(&self) -> &dyn Any;
	fn dyn_eq(&self, other: &dyn Any) -> bool;
	fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T: Hash + Eq + Debug + Send + Sync + 'static> DynKey for T {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn dyn_eq(&self, other: &dyn Any) -> bool {
		other.downcast_ref::<T>().is_some_and(|other| self == other)
	}

	fn dyn_hash(&self, mut state: &mut dyn Hasher) {
		self.hash(&mut state);
	}
}

/// A type-erased by-value identity.
///
/// Two [`Key`]s are equal iff they wrap the same type and their values compare equal.
///
/// ```
/// use tether::Key;
///
/// assert_eq!(Key::new("a"), Key::new("a"));
/// assert_ne!(Key::new(1_u8), Key::new(1_u16));
/// ```
#[derive(Clone)]
pub struct Key(Arc<dyn DynKey>);

impl Key {
	/// Wraps `value`.
	pub fn new<T: Hash + Eq + Debug + Send + Sync + 'static>(value: T) -> Self {
		Self(Arc::new(value))
	}

	/// The wrapped value as `T`, if that's its type.
	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.as_any().downcast_ref()
	}

	/// The [`TypeId`] of the wrapped value, not of [`Key`].
	#[must_use]
	pub fn value_type_id(&self) -> TypeId {
		self.0.as_any().type_id()
	}
}

impl PartialEq for Key {
	fn eq(&self, other: &Self) -> bool {
		self.0.dyn_eq(other.0.as_any())
	}
}

impl Eq for Key {}

impl Hash for Key {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.value_type_id().hash(state);
		self.0.dyn_hash(state);
	}
}

impl Debug for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Key").field(&self.0).finish()
	}
}
