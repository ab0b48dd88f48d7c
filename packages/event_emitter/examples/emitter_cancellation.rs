//! Example demonstrating listeners tied to a cancellation token.
//!
//! A token models the lifetime of some scope (here, a user session). Every listener registered
//! with the token is removed when the session ends, without tracking them individually.

use event_emitter::{CancellationToken, Emitter, Listener, ListenerOptions};

fn main() {
    println!("=== Emitter Cancellation Example ===");

    let emitter = Emitter::<u32>::builder().name("temperature").build();
    let session = CancellationToken::new();
    let options = ListenerOptions::new().cancel_on(&session);

    emitter.add(&Listener::new(|celsius: &u32| {
        println!("   audit log: {celsius} C");
    }));
    emitter.add_with_options(
        &Listener::new(|celsius: &u32| println!("   session display: {celsius} C")),
        &options,
    );
    emitter.once_with_options(
        &Listener::new(|celsius: &u32| println!("   session first reading: {celsius} C")),
        &options,
    );

    println!("\nReading while the session is active:");
    emitter.emit(21);

    println!("\nEnding session...");
    session.cancel();

    println!("\nReading after the session ended:");
    emitter.emit(22);

    // Registering with a token that is already cancelled never invokes the listener.
    emitter.add_with_options(
        &Listener::new(|_: &u32| unreachable!("registered with a cancelled token")),
        &options,
    );
    emitter.emit(23);

    println!("\nListeners remaining: {}", emitter.len());
    println!("Example completed successfully!");
}
