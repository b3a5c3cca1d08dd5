use std::{
	any::{Any, TypeId},
	borrow::Cow,
	collections::HashMap,
	fmt::{self, Debug, Formatter},
	sync::{Arc, Weak},
};

use ahash::RandomState;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::signal::{Signal, WeakSignal};

/// A mapping of names to weakly held [`Signal`]s.
///
/// Looking up the same name again returns the same signal for as long as any strong
/// handle to it exists. Afterwards the entry is evicted and a later lookup creates a fresh one.
///
/// ```
/// use flare::Namespace;
///
/// let namespace = Namespace::<str>::new();
/// let a = namespace.signal("changed");
/// let b = namespace.signal("changed");
/// assert!(a.ptr_eq(&b));
///
/// drop((a, b));
/// assert!(!namespace.contains("changed"));
/// ```
pub struct Namespace<A: ?Sized + 'static, R: 'static = ()> {
	signals: Arc<Mutex<Signals<A, R>>>,
}

type Signals<A, R> = HashMap<String, WeakSignal<A, R>, RandomState>;

impl<A: ?Sized + 'static, R: 'static> Namespace<A, R> {
	/// Creates a new empty namespace.
	#[must_use]
	pub fn new() -> Self {
		Self {
			signals: Arc::new(Mutex::new(HashMap::default())),
		}
	}

	/// Returns the signal called `name`, creating it if necessary.
	pub fn signal(&self, name: &str) -> Signal<A, R> {
		self.get_or_create(name, || Signal::named(name.to_owned()))
	}

	/// Returns the signal called `name`, creating it with `doc` if necessary.
	///
	/// `doc` is ignored if the signal already exists.
	///
	/// ```
	/// use flare::Namespace;
	///
	/// let namespace = Namespace::<()>::new();
	/// let first = namespace.signal_with_doc("saved", "Sent after saving.");
	/// let second = namespace.signal_with_doc("saved", "Something else.");
	/// assert_eq!(second.doc(), Some("Sent after saving."));
	/// # drop(first);
	/// ```
	pub fn signal_with_doc(
		&self,
		name: &str,
		doc: impl Into<Cow<'static, str>>,
	) -> Signal<A, R> {
		self.get_or_create(name, || Signal::named_with_doc(name.to_owned(), doc))
	}

	fn get_or_create(&self, name: &str, create: impl FnOnce() -> Signal<A, R>) -> Signal<A, R> {
		let mut signals = self.signals.lock();
		if let Some(signal) = signals.get(name).and_then(WeakSignal::upgrade) {
			return signal;
		}

		let signal = create();
		let weak = signal.downgrade_with(evict(Arc::downgrade(&self.signals), name.to_owned()));
		debug!(%name, "created signal");
		// A dead entry may linger until its eviction runs. Replaced here, it is dropped outside the lock.
		let stale = signals.insert(name.to_owned(), weak);
		drop(signals);
		drop(stale);
		signal
	}

	/// The number of live entries.
	#[must_use]
	pub fn len(&self) -> usize {
		self.signals
			.lock()
			.values()
			.filter(|signal| signal.is_alive())
			.count()
	}

	/// Whether there are no live entries.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Whether a live signal called `name` exists.
	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.signals
			.lock()
			.get(name)
			.is_some_and(WeakSignal::is_alive)
	}
}

type Namespaces = HashMap<TypeId, Box<dyn Any + Send + Sync>, RandomState>;

static DEFAULT_NAMESPACES: Lazy<Mutex<Namespaces>> = Lazy::new(Mutex::default);

/// The process-wide [`Namespace`] for signals of type [`Signal<A, R>`].
///
/// Each combination of `A` and `R` has its own.
#[must_use]
pub fn default_namespace<A: ?Sized + 'static, R: 'static>() -> Namespace<A, R> {
	DEFAULT_NAMESPACES
		.lock()
		.entry(TypeId::of::<Namespace<A, R>>())
		.or_insert_with(|| Box::new(Namespace::<A, R>::new()))
		.downcast_ref::<Namespace<A, R>>()
		.cloned()
		.unwrap_or_default()
}

/// Returns the signal called `name` in the [`default_namespace`], creating it if necessary.
///
/// Like any [`Namespace`] entry, the signal is only kept while referenced elsewhere.
///
/// ```
/// let started = flare::signal::<str, ()>("started");
/// assert!(started.ptr_eq(&flare::signal("started")));
///
/// // Different types, different signals.
/// let counted = flare::signal::<str, usize>("started");
/// assert_eq!(counted.receiver_count(), 0);
/// # drop(started);
/// ```
pub fn signal<A: ?Sized + 'static, R: 'static>(name: &str) -> Signal<A, R> {
	default_namespace::<A, R>().signal(name)
}

/// Removes the entry for `name` once its signal is gone, unless it was replaced meanwhile.
fn evict<A: ?Sized + 'static, R: 'static>(
	signals: Weak<Mutex<Signals<A, R>>>,
	name: String,
) -> impl 'static + Send + FnOnce() {
	move || {
		let Some(signals) = signals.upgrade() else {
			return;
		};
		let evicted = {
			let mut signals = signals.lock();
			if signals.get(&name).is_some_and(|signal| !signal.is_alive()) {
				signals.remove(&name)
			} else {
				None
			}
		};
		if evicted.is_some() {
			debug!(%name, "evicted signal");
		}
		drop(evicted);
	}
}

impl<A: ?Sized + 'static, R: 'static> Default for Namespace<A, R> {
	fn default() -> Self {
		Self::new()
	}
}

impl<A: ?Sized + 'static, R: 'static> Clone for Namespace<A, R> {
	fn clone(&self) -> Self {
		Self {
			signals: Arc::clone(&self.signals),
		}
	}
}

impl<A: ?Sized + 'static, R: 'static> Debug for Namespace<A, R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut names: Vec<String> = self
			.signals
			.lock()
			.iter()
			.filter(|(_, signal)| signal.is_alive())
			.map(|(name, _)| name.clone())
			.collect();
		names.sort();
		f.debug_struct("Namespace").field("signals", &names).finish()
	}
}
