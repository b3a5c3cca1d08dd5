//! [`Referent`]s are shared allocations that can be observed through [`WeakRef`]s.
//!
//! A [`WeakRef`] created with [`Referent::downgrade_with`] carries a finalizer that runs
//! once the last strong handle is dropped. Dropping such a [`WeakRef`] first cancels
//! its finalizer instead.

use std::{
	any::Any,
	fmt::{self, Debug, Formatter},
	mem,
	ops::Deref,
	panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
	sync::{Arc, Weak},
};

use parking_lot::Mutex;

type Finalizer = Box<dyn 'static + Send + FnOnce()>;

#[derive(Default)]
struct Finalizers {
	next_key: u64,
	entries: Vec<(u64, Finalizer)>,
}

/// The allocation behind a [`Referent`].
///
/// Usually created implicitly by [`Referent::new`]. Construct one manually and pass it
/// to [`Referent::from_arc`] to unsize the value first:
///
/// ```
/// use std::sync::Arc;
/// use tether::{Referent, Rooted};
///
/// let callback: Referent<dyn Send + Sync + Fn(u8) -> u8> =
/// 	Referent::from_arc(Arc::new(Rooted::new(|x: u8| x + 1)));
/// assert_eq!(callback(1), 2);
/// ```
pub struct Rooted<T: ?Sized> {
	finalizers: Arc<Mutex<Finalizers>>,
	value: T,
}

impl<T> Rooted<T> {
	/// Wraps `value` with an empty finalizer table.
	pub fn new(value: T) -> Self {
		Self {
			finalizers: Arc::default(),
			value,
		}
	}
}

impl<T: ?Sized> Drop for Rooted<T> {
	fn drop(&mut self) {
		// `upgrade` fails from here on, so finalizers only ever observe a dead referent.
		let entries = mem::take(&mut self.finalizers.lock().entries);

		let mut panic = None;
		for (_, finalizer) in entries {
			if let Err(p) = catch_unwind(AssertUnwindSafe(finalizer)) {
				panic.get_or_insert(p);
			}
		}
		if let Some(p) = panic {
			resume_unwind(p)
		}
	}
}

/// A strong, cheaply clonable handle to a weakly observable value.
pub struct Referent<T: ?Sized> {
	arc: Arc<Rooted<T>>,
}

impl<T> Referent<T> {
	/// Moves `value` into a new allocation.
	pub fn new(value: T) -> Self {
		Self::from_arc(Arc::new(Rooted::new(value)))
	}
}

impl<T: ?Sized> Referent<T> {
	/// Adopts an existing allocation.
	pub fn from_arc(arc: Arc<Rooted<T>>) -> Self {
		Self { arc }
	}

	/// The allocation's address.
	///
	/// Stable for as long as this handle or any [`WeakRef`] to it exists.
	#[must_use]
	pub fn address(&self) -> usize {
		Arc::as_ptr(&self.arc).cast::<()>() as usize
	}

	/// Whether both handles refer to the same allocation.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.arc, &other.arc)
	}

	/// The number of [`Referent`]s to this allocation, including this one.
	#[must_use]
	pub fn strong_count(&self) -> usize {
		Arc::strong_count(&self.arc)
	}

	/// The number of finalizers currently registered.
	#[must_use]
	pub fn finalizer_count(&self) -> usize {
		self.arc.finalizers.lock().entries.len()
	}

	/// Creates a [`WeakRef`] without finalizer.
	#[must_use]
	pub fn downgrade(&self) -> WeakRef<T> {
		WeakRef {
			weak: Arc::downgrade(&self.arc),
			finalizer: None,
		}
	}

	/// Creates a [`WeakRef`] that runs `finalizer` when the last [`Referent`] is dropped.
	///
	/// `finalizer` runs on the dropping thread, at most once.
	/// It does not run at all if the returned [`WeakRef`] is dropped first.
	#[must_use]
	pub fn downgrade_with(&self, finalizer: impl 'static + Send + FnOnce()) -> WeakRef<T> {
		let key = {
			let mut finalizers = self.arc.finalizers.lock();
			let key = finalizers.next_key;
			finalizers.next_key += 1;
			finalizers.entries.push((key, Box::new(finalizer)));
			key
		};
		WeakRef {
			weak: Arc::downgrade(&self.arc),
			finalizer: Some((Arc::downgrade(&self.arc.finalizers), key)),
		}
	}
}

impl<T: Any + Send + Sync> Referent<T> {
	/// Type-erases a clone of this handle. The address is preserved.
	#[must_use]
	pub fn to_any(&self) -> Referent<dyn Any + Send + Sync> {
		Referent::from_arc(Arc::clone(&self.arc) as Arc<Rooted<dyn Any + Send + Sync>>)
	}
}

impl Referent<dyn Any + Send + Sync> {
	/// The value as `T`, if that's its type.
	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.arc.value.downcast_ref()
	}
}

impl<T: ?Sized> Clone for Referent<T> {
	fn clone(&self) -> Self {
		Self {
			arc: Arc::clone(&self.arc),
		}
	}
}

impl<T: ?Sized> Deref for Referent<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		&self.arc.value
	}
}

impl<T: ?Sized + Debug> Debug for Referent<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Referent").field(&&self.arc.value).finish()
	}
}

/// A non-owning handle to a [`Referent`]'s value.
pub struct WeakRef<T: ?Sized> {
	weak: Weak<Rooted<T>>,
	finalizer: Option<(Weak<Mutex<Finalizers>>, u64)>,
}

impl<T: ?Sized> WeakRef<T> {
	/// Resolves to a strong handle, unless the value was dropped.
	#[must_use]
	pub fn upgrade(&self) -> Option<Referent<T>> {
		self.weak.upgrade().map(Referent::from_arc)
	}

	/// Whether a strong handle still exists.
	#[must_use]
	pub fn is_alive(&self) -> bool {
		self.weak.strong_count() > 0
	}

	/// The referent's address. See [`Referent::address`].
	#[must_use]
	pub fn address(&self) -> usize {
		Weak::as_ptr(&self.weak).cast::<()>() as usize
	}

	/// Whether dropping this handle cancels a finalizer.
	#[must_use]
	pub fn has_finalizer(&self) -> bool {
		self.finalizer.is_some()
	}
}

/// Clones never carry a finalizer.
impl<T: ?Sized> Clone for WeakRef<T> {
	fn clone(&self) -> Self {
		Self {
			weak: Weak::clone(&self.weak),
			finalizer: None,
		}
	}
}

impl<T: ?Sized> Drop for WeakRef<T> {
	fn drop(&mut self) {
		let Some((finalizers, key)) = self.finalizer.take() else {
			return;
		};
		let Some(finalizers) = finalizers.upgrade() else {
			return;
		};
		let removed = {
			let mut finalizers = finalizers.lock();
			finalizers
				.entries
				.iter()
				.position(|&(k, _)| k == key)
				.map(|i| finalizers.entries.swap_remove(i))
		};
		// Dropped outside the lock, since closures may own arbitrary values.
		drop(removed);
	}
}

impl<T: ?Sized> Debug for WeakRef<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakRef")
			.field("address", &self.address())
			.field("alive", &self.is_alive())
			.field("finalizer", &self.has_finalizer())
			.finish()
	}
}
