//! End-to-end scenarios that combine registration, dispatch, one-shot listeners and cancellation
//! through the public API only.

use std::cell::RefCell;
use std::rc::Rc;

use event_emitter::{
    CancellationToken, Emitter, Listener, ListenerOptions, PanicQueue, WaitError,
};
use futures::executor::block_on;

#[derive(Clone, Debug, PartialEq)]
enum Connection {
    Opened(u32),
    Closed(u32),
}

fn connection_log() -> (Listener<Connection>, Rc<RefCell<Vec<Connection>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));

    let listener = Listener::new({
        let log = Rc::clone(&log);
        move |event: &Connection| log.borrow_mut().push(event.clone())
    });

    (listener, log)
}

#[test]
fn duplicate_registration_and_one_shot() {
    let emitter = Emitter::<u32>::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let f = Listener::new({
        let seen = Rc::clone(&seen);
        move |value: &u32| seen.borrow_mut().push(("f", *value))
    });
    let g = Listener::new({
        let seen = Rc::clone(&seen);
        move |value: &u32| seen.borrow_mut().push(("g", *value))
    });

    emitter.add(&f);
    emitter.add(&f);
    emitter.once(&g);
    emitter.emit(1);
    emitter.emit(2);

    assert_eq!(*seen.borrow(), vec![("f", 1), ("g", 1), ("f", 2)]);
}

#[test]
fn session_scoped_listeners_are_removed_with_the_session() {
    let emitter = Emitter::<Connection>::builder()
        .name("connections")
        .build();
    let (global, global_log) = connection_log();
    let (session, session_log) = connection_log();

    let session_token = CancellationToken::new();
    let session_options = ListenerOptions::new().cancel_on(&session_token);

    emitter.add(&global);
    emitter.add_with_options(&session, &session_options);
    emitter.emit(Connection::Opened(1));

    session_token.cancel();
    emitter.emit(Connection::Closed(1));

    assert_eq!(
        *global_log.borrow(),
        vec![Connection::Opened(1), Connection::Closed(1)]
    );
    assert_eq!(*session_log.borrow(), vec![Connection::Opened(1)]);
    assert_eq!(session_token.attached_reactions(), 0);
}

#[test]
fn waiting_for_a_specific_dispatch() {
    let emitter = Emitter::<Connection>::new();

    let first = emitter.wait();
    emitter.emit(Connection::Opened(7));
    let second = emitter.wait();
    emitter.emit(Connection::Closed(7));

    assert_eq!(block_on(first), Ok(Connection::Opened(7)));
    assert_eq!(block_on(second), Ok(Connection::Closed(7)));
    assert!(emitter.is_empty());
}

#[test]
fn abandoned_wait_reports_cancellation_not_silence() {
    let emitter = Emitter::<Connection>::new();
    let token = CancellationToken::new();

    let next = emitter.wait_with_options(&ListenerOptions::new().cancel_on(&token));
    token.cancel();
    emitter.emit(Connection::Opened(1));

    assert_eq!(block_on(next), Err(WaitError::Cancelled));
}

#[test]
fn failing_listener_is_isolated_and_reported_once() {
    let panics = PanicQueue::new();
    let emitter = Emitter::<Connection>::builder()
        .escalate_panics_with(panics.clone())
        .build();
    let (after, after_log) = connection_log();

    emitter.add(&Listener::new(|event: &Connection| {
        if let Connection::Closed(id) = event {
            panic!("connection {id} closed unexpectedly");
        }
    }));
    emitter.add(&after);

    emitter.emit(Connection::Opened(3));
    emitter.emit(Connection::Closed(3));
    emitter.emit(Connection::Opened(4));

    assert_eq!(
        *after_log.borrow(),
        vec![
            Connection::Opened(3),
            Connection::Closed(3),
            Connection::Opened(4)
        ]
    );
    assert_eq!(panics.len(), 1);
    assert_eq!(
        panics.pop().map(|p| p.message().to_owned()),
        Some("connection 3 closed unexpectedly".to_owned())
    );
}

#[test]
fn emitted_flag_survives_remove_all() {
    let emitter = Emitter::<()>::new();
    assert!(!emitter.emitted());

    emitter.emit(());
    emitter.remove_all();

    assert!(emitter.emitted());
}
