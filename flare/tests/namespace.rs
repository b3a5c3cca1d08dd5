use flare::{Namespace, Receiver, Sender};

use _validator::Validator;

#[test]
fn names_map_to_shared_signals() {
	let namespace = Namespace::<()>::new();
	let a = namespace.signal("a");
	let also_a = namespace.signal("a");
	let b = namespace.signal("b");

	assert!(a.ptr_eq(&also_a));
	assert!(!a.ptr_eq(&b));
	assert_eq!(a.name(), Some("a"));
	assert_eq!(namespace.len(), 2);
	assert!(namespace.contains("a"));
	assert!(!namespace.contains("c"));
}

#[test]
fn receivers_are_shared_through_the_name() {
	static V: Validator<&str> = Validator::new();

	let namespace = Namespace::<str>::new();
	let r = Receiver::new(|_: &Sender, text: &str| V.push(if text == "hi" { "hi" } else { "?" }));
	namespace.signal("greeting").connect(&r).unwrap();

	// The signal was dropped in between, so this is a new one.
	namespace.signal("greeting").send_anonymous("hi");
	V.expect([]);

	let greeting = namespace.signal("greeting");
	greeting.connect(&r).unwrap();
	namespace.signal("greeting").send_anonymous("hi");
	V.expect(["hi"]);
}

#[test]
fn unused_signals_are_evicted() {
	let namespace = Namespace::<()>::new();
	let a = namespace.signal("a");
	let weak = a.downgrade();
	assert!(namespace.contains("a"));

	drop(a);
	assert!(!weak.is_alive());
	assert!(!namespace.contains("a"));
	assert!(namespace.is_empty());
	assert_eq!(format!("{namespace:?}"), "Namespace { signals: [] }");

	let fresh = namespace.signal("a");
	assert!(weak.upgrade().is_none());
	assert_eq!(namespace.len(), 1);
	drop(fresh);
	assert_eq!(namespace.len(), 0);
}

#[test]
fn clones_share_entries() {
	let namespace = Namespace::<()>::new();
	let clone = namespace.clone();
	let a = namespace.signal("a");

	assert!(clone.signal("a").ptr_eq(&a));
	assert_eq!(format!("{clone:?}"), "Namespace { signals: [\"a\"] }");
}

#[test]
fn signals_may_outlive_their_namespace() {
	let namespace = Namespace::<()>::new();
	let a = namespace.signal("a");
	drop(namespace);
	// Eviction finds the namespace gone and does nothing.
	drop(a);
}

#[test]
fn documentation_is_set_by_the_first_lookup() {
	let namespace = Namespace::<()>::new();
	let saved = namespace.signal_with_doc("saved", "Sent after saving.");
	assert_eq!(saved.name(), Some("saved"));
	assert_eq!(saved.doc(), Some("Sent after saving."));

	let again = namespace.signal_with_doc("saved", "Ignored.");
	assert!(again.ptr_eq(&saved));
	assert_eq!(again.doc(), Some("Sent after saving."));
	assert_eq!(namespace.signal("saved").doc(), Some("Sent after saving."));

	let plain = namespace.signal("plain");
	assert_eq!(namespace.signal_with_doc("plain", "Too late.").doc(), None);
	drop(plain);

	drop((saved, again));
	assert_eq!(
		namespace.signal_with_doc("saved", "Fresh.").doc(),
		Some("Fresh.")
	);
}

#[test]
fn the_default_namespace_is_shared_per_type() {
	struct Payload;

	let a = flare::signal::<Payload, ()>("default namespace");
	assert!(a.ptr_eq(&flare::signal("default namespace")));
	assert!(flare::default_namespace::<Payload, ()>().contains("default namespace"));
	assert!(!flare::default_namespace::<Payload, u8>().contains("default namespace"));

	let counting = flare::signal::<Payload, u8>("default namespace");
	assert_eq!(counting.receiver_count(), 0);
	a.connect_with(
		&Receiver::new(|_: &Sender, _: &Payload| ()),
		Sender::ANY,
		flare::Strength::Strong,
	)
	.unwrap();
	assert_eq!(flare::signal::<Payload, ()>("default namespace").receiver_count(), 1);
	assert_eq!(counting.receiver_count(), 0);

	drop(a);
	assert!(!flare::default_namespace::<Payload, ()>().contains("default namespace"));
}
