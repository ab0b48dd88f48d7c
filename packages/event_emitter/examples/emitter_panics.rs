//! Example demonstrating how listener panics are isolated from dispatch.
//!
//! The panics are collected in a queue that the caller drains once dispatch is finished.

use event_emitter::{Emitter, Listener, PanicQueue};

fn main() {
    println!("=== Emitter Panics Example ===");

    let panics = PanicQueue::new();
    let emitter = Emitter::<u32>::builder()
        .name("jobs")
        .escalate_panics_with(panics.clone())
        .build();

    emitter.add(&Listener::new(|job: &u32| {
        assert!(job % 2 == 0, "job {job} is odd");
        println!("   validator accepted job {job}");
    }));
    emitter.add(&Listener::new(|job: &u32| println!("   scheduler queued job {job}")));

    for job in 1..=4 {
        println!("\nDispatching job {job}:");
        emitter.emit(job);
    }

    println!("\nCaptured {} listener panics:", panics.len());
    while let Some(panic) = panics.pop() {
        println!("   {}", panic.message());
    }

    println!("\nExample completed successfully!");
}
