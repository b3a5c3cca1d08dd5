use std::{
	fmt::{self, Debug, Formatter},
	hash::{Hash, Hasher},
	sync::Arc,
};

use tether::{Referent, Rooted, WeakRef};

use crate::{Error, Sender};

/// Type-erased receiver closure.
pub type Callback<A, R> = dyn 'static + Send + Sync + Fn(&Sender, &A) -> R;

/// Something that can be connected to a [`Signal<A, R>`](`crate::Signal`).
///
/// Receivers are compared by [identity](`Receiver::id`), never by behaviour:
///
/// - [`Receiver::new`] wraps a closure in a fresh allocation. Clones share its identity.
/// - [`Receiver::function`] is identified by the function's address.
///   It can only be connected [strongly](`crate::Strength::Strong`).
/// - [`Receiver::method`] pairs an owner with a function and is identified by both,
///   so separately created handles for the same pair are interchangeable.
pub struct Receiver<A: ?Sized + 'static, R: 'static = ()>(Callee<A, R>);

enum Callee<A: ?Sized + 'static, R: 'static> {
	Function(fn(&Sender, &A) -> R),
	Closure(Referent<Callback<A, R>>),
	Method(Arc<dyn BoundMethod<A, R>>),
}

/// The identity a [`Receiver`] is indexed by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReceiverId {
	/// A plain function, by address.
	Function(usize),
	/// A closure allocation, by address.
	Closure(usize),
	/// An owner/function pair, by both addresses.
	Method {
		/// The owner's allocation.
		owner: usize,
		/// The function's address.
		function: usize,
	},
}

impl Debug for ReceiverId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match *self {
			ReceiverId::Function(address) => write!(f, "Function({address:#x})"),
			ReceiverId::Closure(address) => write!(f, "Closure({address:#x})"),
			ReceiverId::Method { owner, function } => {
				write!(f, "Method {{ owner: {owner:#x}, function: {function:#x} }}")
			}
		}
	}
}

trait BoundMethod<A: ?Sized + 'static, R: 'static>: Send + Sync {
	fn id(&self) -> ReceiverId;
	fn call(&self, sender: &Sender, args: &A) -> R;
	fn downgrade_with(
		&self,
		finalizer: Box<dyn 'static + Send + FnOnce()>,
	) -> Box<dyn WeakMethod<A, R>>;
}

trait WeakMethod<A: ?Sized + 'static, R: 'static>: Send + Sync {
	fn upgrade(&self) -> Option<Receiver<A, R>>;
}

struct Method<O, A: ?Sized, R> {
	owner: Referent<O>,
	function: fn(&O, &Sender, &A) -> R,
}

struct WeakMethodRef<O, A: ?Sized, R> {
	owner: WeakRef<O>,
	function: fn(&O, &Sender, &A) -> R,
}

impl<O: 'static + Send + Sync, A: ?Sized + 'static, R: 'static> BoundMethod<A, R>
	for Method<O, A, R>
{
	fn id(&self) -> ReceiverId {
		ReceiverId::Method {
			owner: self.owner.address(),
			function: self.function as usize,
		}
	}

	fn call(&self, sender: &Sender, args: &A) -> R {
		(self.function)(&*self.owner, sender, args)
	}

	fn downgrade_with(
		&self,
		finalizer: Box<dyn 'static + Send + FnOnce()>,
	) -> Box<dyn WeakMethod<A, R>> {
		Box::new(WeakMethodRef {
			owner: self.owner.downgrade_with(finalizer),
			function: self.function,
		})
	}
}

impl<O: 'static + Send + Sync, A: ?Sized + 'static, R: 'static> WeakMethod<A, R>
	for WeakMethodRef<O, A, R>
{
	fn upgrade(&self) -> Option<Receiver<A, R>> {
		self.owner.upgrade().map(|owner| {
			Receiver(Callee::Method(Arc::new(Method {
				owner,
				function: self.function,
			})))
		})
	}
}

impl<A: ?Sized + 'static, R: 'static> Receiver<A, R> {
	/// Wraps a closure. Each call creates a distinct receiver.
	pub fn new(f: impl 'static + Send + Sync + Fn(&Sender, &A) -> R) -> Self {
		Self(Callee::Closure(Referent::from_arc(
			Arc::new(Rooted::new(f)) as Arc<Rooted<Callback<A, R>>>
		)))
	}

	/// A plain function, which can't be dropped and so can't be connected weakly.
	///
	/// Identity is the function's address, which isn't guaranteed to be unique:
	/// the compiler may merge identical functions, making them the same receiver.
	pub fn function(f: fn(&Sender, &A) -> R) -> Self {
		Self(Callee::Function(f))
	}

	/// Binds `function` to `owner`.
	///
	/// Weak connections observe `owner`, which is strongly held otherwise.
	///
	/// As with [`Receiver::function`], identical functions may share an address,
	/// so two such methods bound to the same `owner` can be the same receiver.
	pub fn method<O: 'static + Send + Sync>(
		owner: &Referent<O>,
		function: fn(&O, &Sender, &A) -> R,
	) -> Self {
		Self(Callee::Method(Arc::new(Method {
			owner: owner.clone(),
			function,
		})))
	}

	/// The identity this receiver is registered under.
	#[must_use]
	pub fn id(&self) -> ReceiverId {
		match &self.0 {
			Callee::Function(f) => ReceiverId::Function(*f as usize),
			Callee::Closure(closure) => ReceiverId::Closure(closure.address()),
			Callee::Method(method) => method.id(),
		}
	}

	/// Calls the receiver directly, without involving any signal.
	pub fn call(&self, sender: &Sender, args: &A) -> R {
		match &self.0 {
			Callee::Function(f) => f(sender, args),
			Callee::Closure(closure) => closure(sender, args),
			Callee::Method(method) => method.call(sender, args),
		}
	}

	/// Whether this receiver can be connected with [`Strength::Weak`](`crate::Strength::Weak`).
	#[must_use]
	pub fn is_weakly_referenceable(&self) -> bool {
		!matches!(self.0, Callee::Function(_))
	}

	/// # Errors
	///
	/// [`Error::Unweakreferenceable`] for [`Receiver::function`]s.
	pub(crate) fn downgrade_with(
		&self,
		finalizer: impl 'static + Send + FnOnce(),
	) -> Result<WeakReceiver<A, R>, Error> {
		let target = match &self.0 {
			Callee::Function(_) => {
				return Err(Error::Unweakreferenceable {
					receiver: self.id(),
				})
			}
			Callee::Closure(closure) => WeakTarget::Closure(closure.downgrade_with(finalizer)),
			Callee::Method(method) => {
				WeakTarget::Method(method.downgrade_with(Box::new(finalizer)))
			}
		};
		Ok(WeakReceiver {
			id: self.id(),
			target,
		})
	}
}

impl<A: ?Sized + 'static, R: 'static> Clone for Receiver<A, R> {
	fn clone(&self) -> Self {
		Self(match &self.0 {
			Callee::Function(f) => Callee::Function(*f),
			Callee::Closure(closure) => Callee::Closure(closure.clone()),
			Callee::Method(method) => Callee::Method(Arc::clone(method)),
		})
	}
}

impl<A: ?Sized + 'static, R: 'static> PartialEq for Receiver<A, R> {
	fn eq(&self, other: &Self) -> bool {
		self.id() == other.id()
	}
}

impl<A: ?Sized + 'static, R: 'static> Eq for Receiver<A, R> {}

impl<A: ?Sized + 'static, R: 'static> Hash for Receiver<A, R> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id().hash(state);
	}
}

impl<A: ?Sized + 'static, R: 'static> Debug for Receiver<A, R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Receiver").field(&self.id()).finish()
	}
}

/// A weakly held receiver, along with the identity to clean up once it's gone.
pub(crate) struct WeakReceiver<A: ?Sized + 'static, R: 'static> {
	id: ReceiverId,
	target: WeakTarget<A, R>,
}

enum WeakTarget<A: ?Sized + 'static, R: 'static> {
	Closure(WeakRef<Callback<A, R>>),
	Method(Box<dyn WeakMethod<A, R>>),
}

impl<A: ?Sized + 'static, R: 'static> WeakReceiver<A, R> {
	pub(crate) fn id(&self) -> ReceiverId {
		self.id
	}

	pub(crate) fn upgrade(&self) -> Option<Receiver<A, R>> {
		match &self.target {
			WeakTarget::Closure(closure) => closure
				.upgrade()
				.map(|closure| Receiver(Callee::Closure(closure))),
			WeakTarget::Method(method) => method.upgrade(),
		}
	}
}
