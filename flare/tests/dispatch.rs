use std::{
	mem,
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{Arc, Mutex},
};

use assert_matches::assert_matches;
use flare::{Error, Receiver, Referent, Sender, Signal};

use _validator::Validator;

#[test]
fn scenario() {
	let s = Signal::<i32, i32>::new();
	let f = Receiver::new(|sender: &Sender, x: &i32| {
		assert!(sender.is_none());
		x + 1
	});
	s.connect_to(&f, Sender::ANY).unwrap();

	assert_eq!(s.send(Sender::NONE, &1), [(f.clone(), 2)]);
}

#[test]
fn fan_out() {
	static V: Validator<usize> = Validator::new();

	let signal = Signal::<(), usize>::new();
	let receivers: Vec<_> = (0..5)
		.map(|i| {
			Receiver::new(move |_: &Sender, (): &()| {
				V.push(i);
				i
			})
		})
		.collect();
	for receiver in &receivers {
		signal.connect(receiver).unwrap();
	}

	let mut results: Vec<_> = signal
		.send_anonymous(&())
		.into_iter()
		.map(|(_, i)| i)
		.collect();
	results.sort_unstable();
	assert_eq!(results, [0, 1, 2, 3, 4]);
	V.expect_unordered(0..5);
}

#[test]
fn results_pair_receivers_with_their_return_values() {
	let signal = Signal::<i32, i32>::new();
	let double = Receiver::new(|_: &Sender, x: &i32| x * 2);
	let negate = Receiver::new(|_: &Sender, x: &i32| -x);
	signal.connect(&double).unwrap();
	signal.connect(&negate).unwrap();

	for (receiver, result) in signal.send_anonymous(&7) {
		assert_eq!(result, receiver.call(&Sender::NONE, &7));
	}
}

#[test]
fn sender_filtering() {
	static V: Validator<&str> = Validator::new();

	let signal = Signal::<()>::new();
	let a = Referent::new("a");
	let b = Referent::new("b");
	let only_a = Receiver::new(|sender: &Sender, (): &()| {
		V.push(sender.downcast_ref::<&str>().copied().unwrap_or("?"));
	});
	signal.connect_to(&only_a, &a).unwrap();

	assert!(signal.send(&b, &()).is_empty());
	V.expect([]);

	assert_eq!(signal.send(&a, &()).len(), 1);
	V.expect(["a"]);
}

#[test]
fn any_and_specific_receivers() {
	static V: Validator<&str> = Validator::new();

	let signal = Signal::<()>::new();
	let a = Sender::key("a");
	let b = Sender::key("b");
	let any = Receiver::new(|_: &Sender, (): &()| V.push("any"));
	let specific = Receiver::new(|_: &Sender, (): &()| V.push("specific"));
	signal.connect(&any).unwrap();
	signal.connect_to(&specific, &a).unwrap();

	signal.send(&a, &());
	V.expect_unordered(["any", "specific"]);

	signal.send(&b, &());
	V.expect(["any"]);
}

#[test]
fn a_receiver_connected_twice_is_called_once() {
	static V: Validator<&str> = Validator::new();

	let signal = Signal::<()>::new();
	let a = Sender::key(1_u8);
	let r = Receiver::new(|_: &Sender, (): &()| V.push("r"));
	signal.connect(&r).unwrap();
	signal.connect_to(&r, &a).unwrap();
	signal.connect_to(&r, &a).unwrap();

	assert_eq!(signal.send(&a, &()).len(), 1);
	V.expect(["r"]);
	assert_eq!(signal.receiver_count(), 1);
}

#[test]
fn no_receivers() {
	let signal = Signal::<()>::new();
	assert!(signal.is_empty());
	assert!(signal.send(Sender::NONE, &()).is_empty());
	assert!(signal.send(Sender::ANY, &()).is_empty());
	assert!(signal.send(Sender::key("x"), &()).is_empty());
	assert!(signal.send_anonymous(&()).is_empty());
	assert!(!signal.has_receivers_for(Sender::ANY));
	assert_eq!(signal.receivers_for(Sender::NONE).count(), 0);
}

#[test]
fn sending_as_any_reaches_only_any_receivers() {
	static V: Validator<&str> = Validator::new();

	let signal = Signal::<()>::new();
	let any = Receiver::new(|_: &Sender, (): &()| V.push("any"));
	let none = Receiver::new(|_: &Sender, (): &()| V.push("none"));
	signal.connect(&any).unwrap();
	signal.connect_to(&none, Sender::NONE).unwrap();

	signal.send(Sender::ANY, &());
	V.expect(["any"]);

	signal.send(Sender::NONE, &());
	V.expect_unordered(["any", "none"]);
}

#[test]
fn multiple_senders_are_rejected() {
	static V: Validator<&str> = Validator::new();

	let signal = Signal::<()>::new();
	let r = Receiver::new(|_: &Sender, (): &()| V.push("r"));
	signal.connect(&r).unwrap();

	assert_matches!(
		signal.send_from(&[Sender::key(1), Sender::key(2)], &()),
		Err(Error::InvalidArgument { given: 2 })
	);
	V.expect([]);

	assert_eq!(signal.send_from(&[], &()).unwrap().len(), 1);
	assert_eq!(signal.send_from(&[Sender::key(1)], &()).unwrap().len(), 1);
	V.expect(["r", "r"]);
}

#[test]
fn try_send_stops_at_the_first_error() {
	let log = Arc::new(Mutex::new(Vec::new()));

	let signal = Signal::<i32, Result<i32, String>>::new();
	let ok = Receiver::new({
		let log = Arc::clone(&log);
		move |_: &Sender, x: &i32| {
			log.lock().unwrap().push("ok");
			Ok(*x)
		}
	});
	signal.connect(&ok).unwrap();

	assert_eq!(signal.try_send(Sender::NONE, &3), Ok(vec![(ok.clone(), 3)]));
	assert_eq!(mem::take(&mut *log.lock().unwrap()), ["ok"]);

	let failing = Receiver::new({
		let log = Arc::clone(&log);
		move |_: &Sender, x: &i32| {
			log.lock().unwrap().push("failing");
			Err(format!("no {x}"))
		}
	});
	signal.connect(&failing).unwrap();

	assert_eq!(signal.try_send(Sender::NONE, &3), Err(String::from("no 3")));
	// Dispatch order is unspecified, but nothing runs after the failure.
	assert_eq!(log.lock().unwrap().last(), Some(&"failing"));
	assert_eq!(signal.receiver_count(), 2);
}

#[test]
fn panics_propagate_and_leave_the_signal_usable() {
	let signal = Signal::<bool>::new();
	let r = Receiver::new(|_: &Sender, fail: &bool| assert!(!fail, "receiver failed"));
	signal.connect(&r).unwrap();

	assert!(catch_unwind(AssertUnwindSafe(|| signal.send_anonymous(&true))).is_err());
	assert_eq!(signal.send_anonymous(&false).len(), 1);
}

#[test]
fn unsized_payloads() {
	let signal = Signal::<str, usize>::named("lengths");
	let len = Receiver::new(|_: &Sender, text: &str| text.len());
	signal.connect(&len).unwrap();

	assert_eq!(signal.send_anonymous("four"), [(len.clone(), 4)]);
}

#[test]
fn signals_can_be_senders() {
	static V: Validator<bool> = Validator::new();

	let source = Signal::<()>::named("source");
	let other = Signal::<()>::named("other");
	let relay = Signal::<()>::new();
	let r = Receiver::new(|sender: &Sender, (): &()| V.push(sender.as_object().is_some()));
	relay.connect_to(&r, &source).unwrap();

	relay.send(&other, &());
	V.expect([]);
	relay.send(&source, &());
	V.expect([true]);
}

#[test]
fn names_and_docs() {
	let signal = Signal::<()>::named_with_doc("saved", "Sent after saving.");
	assert_eq!(signal.name(), Some("saved"));
	assert_eq!(signal.doc(), Some("Sent after saving."));
	assert_eq!(format!("{signal:?}"), "Signal { name: Some(\"saved\"), receivers: 0, .. }");

	let anonymous = Signal::<()>::with_doc("Anonymous.");
	assert_eq!(anonymous.name(), None);
	assert_eq!(anonymous.doc(), Some("Anonymous."));
}

#[test]
fn clones_share_receivers() {
	let signal = Signal::<()>::new();
	let clone = signal.clone();
	let r = Receiver::new(|_: &Sender, (): &()| ());
	clone.connect(&r).unwrap();

	assert!(signal.ptr_eq(&clone));
	assert_eq!(signal.send_anonymous(&()).len(), 1);
	assert!(!signal.ptr_eq(&Signal::new()));
}
