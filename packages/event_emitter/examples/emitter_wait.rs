//! Example demonstrating awaiting the next emitted value.

use event_emitter::{CancellationToken, Emitter, ListenerOptions, WaitError};
use futures::executor::block_on;

fn main() {
    println!("=== Emitter Wait Example ===");

    let emitter = Emitter::<&'static str>::new();

    // 1. The future resolves with the first value emitted after `wait()`.
    println!("\n1. Waiting for the next value:");
    let next = emitter.wait();
    emitter.emit("ready");
    emitter.emit("ignored by the future");

    match block_on(next) {
        Ok(value) => println!("   Received value: {value}"),
        Err(error) => println!("   Wait failed: {error}"),
    }

    // 2. Cancelling the token before anything is emitted fails the future.
    println!("\n2. Cancelling the wait:");
    let token = CancellationToken::new();
    let next = emitter.wait_with_options(&ListenerOptions::new().cancel_on(&token));
    token.cancel();
    emitter.emit("too late");

    match block_on(next) {
        Ok(value) => println!("   Received value: {value}"),
        Err(WaitError::Cancelled) => println!("   Wait was cancelled (as expected)"),
        Err(error) => println!("   Wait failed: {error}"),
    }

    // 3. Dropping the emitter fails any pending future.
    println!("\n3. Dropping the emitter:");
    let next = emitter.wait();
    drop(emitter);

    match block_on(next) {
        Ok(value) => println!("   Received value: {value}"),
        Err(error) => println!("   Wait failed: {error}"),
    }

    println!("\nExample completed successfully!");
}
