//! Simple standalone example of the synchronization engine.
//!
//! Two replicas edit concurrently, exchange their operations, and converge.
//!
//! Run with: cargo run --example simple

use textsync::engine::{ElementId, MergeEngine};

fn main() {
    println!("=== Simple textsync Example ===\n");

    // Create two replicas representing two users
    let mut alice = MergeEngine::new(1);
    let mut bob = MergeEngine::new(2);

    println!("Alice (site 1) and Bob (site 2) start editing a document\n");

    // Alice types "Hello"
    println!("Alice types 'Hello':");
    let mut alice_ops = Vec::new();
    let mut last = ElementId::HEAD;
    for ch in "Hello".chars() {
        let op = alice.local_insert(ch, last).unwrap();
        last = op.origin;
        alice_ops.push(op);
    }
    println!("  Alice's document: '{}'", alice.render());

    // Bob concurrently types "World!" starting from the beginning
    println!("\nBob concurrently types 'World!' (also from the start):");
    let mut bob_ops = Vec::new();
    let mut last = ElementId::HEAD;
    for ch in "World!".chars() {
        let op = bob.local_insert(ch, last).unwrap();
        last = op.origin;
        bob_ops.push(op);
    }
    println!("  Bob's document: '{}'", bob.render());

    println!("\n--- Before Synchronization ---");
    println!("  Alice sees: '{}'", alice.render());
    println!("  Bob sees:   '{}'", bob.render());

    // Exchange operations
    println!("\n--- Synchronizing Changes ---");
    println!("Alice receives Bob's operations...");
    for op in &bob_ops {
        alice.integrate(op.clone());
    }

    println!("Bob receives Alice's operations...");
    for op in &alice_ops {
        bob.integrate(op.clone());
    }

    println!("\n--- After Synchronization ---");
    println!("  Alice sees: '{}'", alice.render());
    println!("  Bob sees:   '{}'", bob.render());

    if alice.render() == bob.render() {
        println!("\n✓ SUCCESS: Both users converged to the same document!");
        println!("✓ Final content: '{}'", alice.render());
    } else {
        println!("\n✗ ERROR: Documents did not converge!");
    }
}
