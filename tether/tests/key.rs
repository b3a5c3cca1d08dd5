use std::{
	collections::{hash_map::DefaultHasher, HashSet},
	hash::{Hash, Hasher},
};

use tether::Key;

fn hash_of(key: &Key) -> u64 {
	let mut hasher = DefaultHasher::new();
	key.hash(&mut hasher);
	hasher.finish()
}

#[test]
fn equality_is_by_type_and_value() {
	assert_eq!(Key::new("sender"), Key::new("sender"));
	assert_ne!(Key::new("sender"), Key::new("receiver"));
	assert_ne!(Key::new(1_u32), Key::new(1_u64));
	assert_eq!(Key::new(String::from("a")), Key::new(String::from("a")));
	assert_ne!(Key::new(String::from("a")), Key::new("a"));
}

#[test]
fn equal_keys_hash_equally() {
	assert_eq!(hash_of(&Key::new((1, "x"))), hash_of(&Key::new((1, "x"))));

	let set: HashSet<Key> = [Key::new(1), Key::new(1), Key::new(2), Key::new("1")]
		.into_iter()
		.collect();
	assert_eq!(set.len(), 3);
}

#[test]
fn downcast() {
	let key = Key::new(42_u16);
	assert_eq!(key.downcast_ref::<u16>(), Some(&42));
	assert_eq!(key.downcast_ref::<u32>(), None);
	assert_eq!(format!("{key:?}"), "Key(42)");
}
