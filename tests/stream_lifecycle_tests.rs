use plexus_stream::{Disposer, Emitter, Stream, StreamError, StreamEvent};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Stream whose publisher records activations and parks its emitter for the
/// test to drive by hand.
fn manual_stream() -> (
    Stream<i32>,
    Rc<RefCell<Option<Emitter<i32>>>>,
    Rc<Cell<usize>>,
) {
    let emitter_slot = Rc::new(RefCell::new(None));
    let activations = Rc::new(Cell::new(0));
    let slot = Rc::clone(&emitter_slot);
    let count = Rc::clone(&activations);
    let stream = Stream::new(move |emitter| {
        count.set(count.get() + 1);
        *slot.borrow_mut() = Some(emitter);
        None
    });
    (stream, emitter_slot, activations)
}

fn parked_emitter(slot: &Rc<RefCell<Option<Emitter<i32>>>>) -> Emitter<i32> {
    slot.borrow().clone().expect("publisher was not activated")
}

#[test]
fn test_publisher_runs_lazily_on_first_subscription() {
    let (stream, _slot, activations) = manual_stream();
    assert_eq!(activations.get(), 0);

    stream.for_each(|_| {});
    assert_eq!(activations.get(), 1);
}

#[test]
fn test_publisher_runs_once_for_many_observers() {
    let (stream, _slot, activations) = manual_stream();

    stream.for_each(|_| {});
    stream.for_each(|_| {});
    stream.observe(|_, _| {});
    assert_eq!(activations.get(), 1);
}

#[test]
fn test_events_fan_out_in_subscription_order() {
    let (stream, slot, _activations) = manual_stream();
    let log = Rc::new(RefCell::new(Vec::new()));

    let first = Rc::clone(&log);
    stream.for_each(move |value| first.borrow_mut().push(("first", value)));
    let second = Rc::clone(&log);
    stream.for_each(move |value| second.borrow_mut().push(("second", value)));

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    emitter.push(2);

    assert_eq!(
        *log.borrow(),
        vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
    );
}

#[test]
fn test_dispose_stops_delivery() {
    let (stream, slot, _activations) = manual_stream();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&seen);
    let subscription = stream.for_each(move |value| sink.borrow_mut().push(value));

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    subscription.dispose();
    emitter.push(2);

    assert_eq!(*seen.borrow(), vec![1]);
}

#[test]
fn test_duplicate_callbacks_dispose_independently() {
    let (stream, slot, _activations) = manual_stream();
    let hits = Rc::new(Cell::new(0));

    let first_hits = Rc::clone(&hits);
    let first = stream.for_each(move |_| first_hits.set(first_hits.get() + 1));
    let second_hits = Rc::clone(&hits);
    let _second = stream.for_each(move |_| second_hits.set(second_hits.get() + 1));

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    assert_eq!(hits.get(), 2);

    // Removing one subscription leaves the other delivering.
    first.dispose();
    emitter.push(2);
    assert_eq!(hits.get(), 3);
}

#[test]
fn test_close_handle_runs_when_last_observer_leaves() {
    let closes = Rc::new(Cell::new(0));
    let closer = Rc::clone(&closes);
    let stream: Stream<i32> = Stream::new(move |_emitter| {
        let closer = Rc::clone(&closer);
        Some(Box::new(move || closer.set(closer.get() + 1)))
    });

    let subscription = stream.for_each(|_| {});
    assert_eq!(closes.get(), 0);

    subscription.dispose();
    assert_eq!(closes.get(), 1);
}

#[test]
fn test_close_handle_waits_for_remaining_observers() {
    let closes = Rc::new(Cell::new(0));
    let closer = Rc::clone(&closes);
    let stream: Stream<i32> = Stream::new(move |_emitter| {
        let closer = Rc::clone(&closer);
        Some(Box::new(move || closer.set(closer.get() + 1)))
    });

    let first = stream.for_each(|_| {});
    let second = stream.for_each(|_| {});

    first.dispose();
    assert_eq!(closes.get(), 0);

    second.dispose();
    assert_eq!(closes.get(), 1);
}

#[test]
fn test_finish_observer_holds_stream_open() {
    let closes = Rc::new(Cell::new(0));
    let closer = Rc::clone(&closes);
    let stream: Stream<i32> = Stream::new(move |_emitter| {
        let closer = Rc::clone(&closer);
        Some(Box::new(move || closer.set(closer.get() + 1)))
    });

    let data = stream.for_each(|_| {});
    let finish = stream.on_finish(|_| {});

    data.dispose();
    assert_eq!(closes.get(), 0);

    finish.dispose();
    assert_eq!(closes.get(), 1);
}

#[test]
fn test_reopen_after_close_reinvokes_publisher() {
    let (stream, slot, activations) = manual_stream();
    let seen = Rc::new(RefCell::new(Vec::new()));

    stream.for_each(|_| {}).dispose();
    assert_eq!(activations.get(), 1);

    let sink = Rc::clone(&seen);
    stream.for_each(move |value| sink.borrow_mut().push(value));
    assert_eq!(activations.get(), 2);

    // The second activation delivers to the new observer.
    parked_emitter(&slot).push(7);
    assert_eq!(*seen.borrow(), vec![7]);
}

#[test]
fn test_settle_prevents_reactivation() {
    let (stream, slot, activations) = manual_stream();

    let subscription = stream.for_each(|_| {});
    parked_emitter(&slot).settle(());
    subscription.dispose();

    stream.for_each(|_| {});
    assert_eq!(activations.get(), 1);
    assert!(stream.is_terminated());
}

#[test]
fn test_observe_after_termination_is_inert() {
    let (stream, slot, _activations) = manual_stream();

    stream.for_each(|_| {});
    parked_emitter(&slot).settle(());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let disposer = stream.observe(move |event, _| sink.borrow_mut().push(event));

    assert!(seen.borrow().is_empty());

    // Inert disposers may be called any number of times.
    disposer.dispose();
    disposer.dispose();
}

#[test]
fn test_sync_settlement_runs_close_handle() {
    let closes = Rc::new(Cell::new(0));
    let closer = Rc::clone(&closes);
    let stream: Stream<i32> = Stream::new(move |emitter| {
        emitter.settle(());
        let closer = Rc::clone(&closer);
        Some(Box::new(move || closer.set(closer.get() + 1)))
    });

    stream.for_each(|_| {});
    assert_eq!(closes.get(), 1);
    assert!(stream.is_terminated());
}

#[test]
fn test_close_handle_runs_once_across_close_and_settle() {
    let closes = Rc::new(Cell::new(0));
    let emitter_slot: Rc<RefCell<Option<Emitter<i32>>>> = Rc::new(RefCell::new(None));

    let closer = Rc::clone(&closes);
    let slot = Rc::clone(&emitter_slot);
    let stream: Stream<i32> = Stream::new(move |emitter| {
        *slot.borrow_mut() = Some(emitter);
        let closer = Rc::clone(&closer);
        Some(Box::new(move || closer.set(closer.get() + 1)))
    });

    let subscription = stream.for_each(|_| {});
    let emitter = parked_emitter(&emitter_slot);

    // Transient close consumes the handle.
    subscription.dispose();
    assert_eq!(closes.get(), 1);

    // Settling the closed stream must not run it again.
    emitter.settle(());
    assert_eq!(closes.get(), 1);
}

#[test]
fn test_settle_twice_delivers_single_terminal_event() {
    let (stream, slot, _activations) = manual_stream();
    let finishes = Rc::new(Cell::new(0));

    let count = Rc::clone(&finishes);
    stream.on_finish(move |_| count.set(count.get() + 1));

    let emitter = parked_emitter(&slot);
    emitter.settle(());
    emitter.settle(());
    emitter.fail(StreamError::Custom("late".to_string()));

    assert_eq!(finishes.get(), 1);
}

#[test]
fn test_first_settlement_wins() {
    let (stream, slot, _activations) = manual_stream();
    let outcome = Rc::new(RefCell::new(None));

    let sink = Rc::clone(&outcome);
    stream.on_finish(move |result| *sink.borrow_mut() = Some(result));

    let emitter = parked_emitter(&slot);
    emitter.settle(());
    emitter.fail(StreamError::Custom("too late".to_string()));

    assert_eq!(*outcome.borrow(), Some(Ok(())));
}

#[test]
fn test_event_shapes() {
    let (stream, slot, _activations) = manual_stream();
    let events = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&events);
    stream.observe(move |event, _| sink.borrow_mut().push(event));

    let emitter = parked_emitter(&slot);
    emitter.push(5);
    emitter.push(6);
    emitter.settle(());

    let seen = events.borrow();
    assert_eq!(
        *seen,
        vec![
            StreamEvent::Data(5),
            StreamEvent::Data(6),
            StreamEvent::Success(())
        ]
    );
    // The accessors agree with the shapes.
    assert_eq!(seen[0].data(), Some(&5));
    assert_eq!(seen[2].data(), None);
    assert!(!seen[0].is_terminal());
    assert!(seen[2].is_terminal());
}

#[test]
fn test_failure_reaches_observers() {
    let (stream, slot, _activations) = manual_stream();
    let events = Rc::new(RefCell::new(Vec::new()));
    let outcome = Rc::new(RefCell::new(None));

    let sink = Rc::clone(&events);
    stream.observe(move |event, _| sink.borrow_mut().push(event));
    let result_sink = Rc::clone(&outcome);
    stream.await_completion(|_| {}, move |error| *result_sink.borrow_mut() = Some(error));

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    emitter.fail(StreamError::Custom("boom".to_string()));

    assert_eq!(
        *events.borrow(),
        vec![
            StreamEvent::Data(1),
            StreamEvent::Failure(StreamError::Custom("boom".to_string()))
        ]
    );
    assert_eq!(
        *outcome.borrow(),
        Some(StreamError::Custom("boom".to_string()))
    );
}

#[test]
#[should_panic(expected = "value emitted after stream termination")]
fn test_push_after_settle_panics() {
    let (stream, slot, _activations) = manual_stream();
    stream.for_each(|_| {});

    let emitter = parked_emitter(&slot);
    emitter.settle(());
    emitter.push(1);
}

#[test]
#[should_panic(expected = "listener already removed")]
fn test_dispose_twice_panics() {
    let (stream, _slot, _activations) = manual_stream();
    let subscription = stream.for_each(|_| {});

    subscription.dispose();
    subscription.dispose();
}

#[test]
fn test_self_disposal_from_callback() {
    let hits = Rc::new(Cell::new(0));
    let count = Rc::clone(&hits);
    let stream: Stream<i32> = Stream::new(|emitter| {
        emitter.push(1);
        emitter.push(2);
        emitter.push(3);
        None
    });

    stream.observe(move |event, disposer| {
        if let StreamEvent::Data(_) = event {
            count.set(count.get() + 1);
            disposer.dispose();
        }
    });

    assert_eq!(hits.get(), 1);
}

#[test]
fn test_mid_delivery_disposal_spares_later_observers() {
    let (stream, slot, _activations) = manual_stream();
    let early = Rc::new(RefCell::new(Vec::new()));
    let late = Rc::new(RefCell::new(Vec::new()));

    let early_sink = Rc::clone(&early);
    stream.observe(move |event, disposer| {
        if let StreamEvent::Data(value) = event {
            early_sink.borrow_mut().push(value);
            if value == 2 {
                disposer.dispose();
            }
        }
    });
    let late_sink = Rc::clone(&late);
    stream.for_each(move |value| late_sink.borrow_mut().push(value));

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    emitter.push(2);
    emitter.push(3);

    // The second observer still sees the event that removed the first.
    assert_eq!(*early.borrow(), vec![1, 2]);
    assert_eq!(*late.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_observer_added_mid_delivery_misses_inflight_event() {
    let (stream, slot, _activations) = manual_stream();
    let added = Rc::new(RefCell::new(Vec::new()));
    let hooked = Rc::new(Cell::new(false));

    let recruiter = stream.clone();
    let added_sink = Rc::clone(&added);
    let once = Rc::clone(&hooked);
    stream.for_each(move |_| {
        if !once.get() {
            once.set(true);
            let sink = Rc::clone(&added_sink);
            recruiter.for_each(move |value| sink.borrow_mut().push(value));
        }
    });

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    emitter.push(2);

    assert_eq!(*added.borrow(), vec![2]);
}

#[test]
fn test_replacement_observer_is_not_mistaken_for_removed_one() {
    let (stream, slot, _activations) = manual_stream();
    let second_sub: Rc<RefCell<Option<Disposer>>> = Rc::new(RefCell::new(None));
    let first_seen = Rc::new(RefCell::new(Vec::new()));
    let removed_seen = Rc::new(RefCell::new(Vec::new()));
    let replacement_seen = Rc::new(RefCell::new(Vec::new()));

    let recruiter = stream.clone();
    let target = Rc::clone(&second_sub);
    let first_sink = Rc::clone(&first_seen);
    let replacement_sink = Rc::clone(&replacement_seen);
    stream.for_each(move |value| {
        first_sink.borrow_mut().push(value);
        // On the first event, swap the trailing observer for a new one.
        // The newcomer reclaims the freed registry slot while delivery of
        // that event is still in flight.
        if let Some(subscription) = target.borrow_mut().take() {
            subscription.dispose();
            let sink = Rc::clone(&replacement_sink);
            recruiter.for_each(move |value| sink.borrow_mut().push(value));
        }
    });
    let removed_sink = Rc::clone(&removed_seen);
    *second_sub.borrow_mut() = Some(stream.for_each(move |value| {
        removed_sink.borrow_mut().push(value);
    }));

    let emitter = parked_emitter(&slot);
    emitter.push(1);
    emitter.push(2);

    assert_eq!(*first_seen.borrow(), vec![1, 2]);
    // The removed observer sees nothing, and its replacement starts with
    // the next event rather than the in-flight one.
    assert!(removed_seen.borrow().is_empty());
    assert_eq!(*replacement_seen.borrow(), vec![2]);
}

#[test]
fn test_await_completion_pins_stream_open() {
    let closes = Rc::new(Cell::new(0));
    let emitter_slot: Rc<RefCell<Option<Emitter<i32>>>> = Rc::new(RefCell::new(None));

    let closer = Rc::clone(&closes);
    let slot = Rc::clone(&emitter_slot);
    let stream: Stream<i32> = Stream::new(move |emitter| {
        *slot.borrow_mut() = Some(emitter);
        let closer = Rc::clone(&closer);
        Some(Box::new(move || closer.set(closer.get() + 1)))
    });

    let resolved = Rc::new(Cell::new(false));
    let done = Rc::clone(&resolved);
    stream.await_completion(move |_| done.set(true), |_| {});

    // A completion waiter alone keeps the stream open.
    let subscription = stream.for_each(|_| {});
    subscription.dispose();
    assert_eq!(closes.get(), 0);

    parked_emitter(&emitter_slot).settle(());
    assert_eq!(closes.get(), 1);
    assert!(resolved.get());
}

#[test]
fn test_await_completion_after_settlement_fires_immediately() {
    let (stream, slot, _activations) = manual_stream();

    stream.for_each(|_| {});
    parked_emitter(&slot).settle(());

    let resolved = Rc::new(Cell::new(false));
    let done = Rc::clone(&resolved);
    stream.await_completion(move |_| done.set(true), |_| {});

    assert!(resolved.get());
}

#[test]
fn test_dispose_after_termination_is_silent() {
    let (stream, slot, _activations) = manual_stream();
    let subscription = stream.for_each(|_| {});

    parked_emitter(&slot).settle(());

    // The record is already gone; the first dispose is a quiet no-op.
    subscription.dispose();
}

#[test]
fn test_drop_while_active_runs_close_handle() {
    let closes = Rc::new(Cell::new(0));
    {
        let closer = Rc::clone(&closes);
        let stream: Stream<i32> = Stream::new(move |_emitter| {
            let closer = Rc::clone(&closer);
            Some(Box::new(move || closer.set(closer.get() + 1)))
        });
        let _subscription = stream.for_each(|_| {});
        assert_eq!(closes.get(), 0);
    }
    assert_eq!(closes.get(), 1);
}

#[test]
fn test_subscription_keeps_stream_deliverable() {
    let emitter_slot: Rc<RefCell<Option<Emitter<i32>>>> = Rc::new(RefCell::new(None));
    let seen = Rc::new(RefCell::new(Vec::new()));

    // Subscribe on a temporary; the returned handle is all that survives
    // the statement.
    let slot = Rc::clone(&emitter_slot);
    let sink = Rc::clone(&seen);
    let subscription = Stream::new(move |emitter| {
        *slot.borrow_mut() = Some(emitter);
        None
    })
    .for_each(move |value| sink.borrow_mut().push(value));

    parked_emitter(&emitter_slot).push(1);
    assert_eq!(*seen.borrow(), vec![1]);

    subscription.dispose();
    parked_emitter(&emitter_slot).push(2);
    assert_eq!(*seen.borrow(), vec![1]);
}

#[test]
fn test_emitter_outliving_stream_is_silent() {
    let (stream, slot, _activations) = manual_stream();
    stream.for_each(|_| {});

    let emitter = parked_emitter(&slot);
    drop(stream);

    // The stream state is gone; pushes and settlements go nowhere.
    emitter.push(1);
    emitter.settle(());
    assert!(emitter.is_terminated());
}
