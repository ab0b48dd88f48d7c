//! Basic example of registering listeners and emitting values.
//!
//! Demonstrates registration order, idempotent registration and one-shot listeners.

use event_emitter::{Emitter, Listener};

fn main() {
    println!("=== Emitter Basic Example ===");

    let emitter = Emitter::<String>::new();

    let printer = Listener::new(|message: &String| println!("   printer received: {message}"));
    let counter = Listener::new(|message: &String| println!("   counter saw {} bytes", message.len()));
    let greeter = Listener::new(|message: &String| println!("   greeter (once) received: {message}"));

    emitter.add(&printer);
    emitter.add(&counter);

    // Registering the same listener again does nothing.
    emitter.add(&printer);
    emitter.once(&greeter);

    println!("\nRegistered listeners: {}", emitter.len());

    println!("\nFirst emit:");
    emitter.emit("hello".to_string());

    println!("\nSecond emit (the one-shot listener is gone):");
    emitter.emit("world".to_string());

    emitter.remove(&counter);

    println!("\nThird emit (counter removed):");
    emitter.emit("!".to_string());

    println!("\nExample completed successfully!");
}
