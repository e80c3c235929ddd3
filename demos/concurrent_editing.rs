//! Demonstration of concurrent editing scenarios.
//!
//! Walks through the situations the engine exists to handle: concurrent
//! inserts at the same spot, deletion racing an insertion, out-of-order
//! delivery with causal buffering, and duplicate delivery.
//!
//! Run with: cargo run --example concurrent_editing

use textsync::engine::{ElementId, Integration, MergeEngine};

fn main() {
    scenario_concurrent_inserts();
    scenario_delete_vs_insert();
    scenario_out_of_order_delivery();
    scenario_duplicate_delivery();
}

fn scenario_concurrent_inserts() {
    println!("=== Scenario 1: concurrent inserts at the same spot ===\n");

    let mut alice = MergeEngine::new(1);
    let mut bob = MergeEngine::new(2);

    // Both type at the start of an empty document.
    let mut alice_ops = Vec::new();
    let mut last = ElementId::HEAD;
    for ch in "hi".chars() {
        let op = alice.local_insert(ch, last).unwrap();
        last = op.origin;
        alice_ops.push(op);
    }

    let mut bob_ops = Vec::new();
    let mut last = ElementId::HEAD;
    for ch in "yo".chars() {
        let op = bob.local_insert(ch, last).unwrap();
        last = op.origin;
        bob_ops.push(op);
    }

    println!("Alice typed 'hi'  -> '{}'", alice.render());
    println!("Bob typed 'yo'    -> '{}'", bob.render());

    for op in &bob_ops {
        alice.integrate(op.clone());
    }
    for op in &alice_ops {
        bob.integrate(op.clone());
    }

    println!("After sync, Alice -> '{}'", alice.render());
    println!("After sync, Bob   -> '{}'", bob.render());
    assert_eq!(alice.render(), bob.render());
    println!("Position references decided the order, not arrival time.\n");
}

fn scenario_delete_vs_insert() {
    println!("=== Scenario 2: deletion racing an insertion ===\n");

    let mut alice = MergeEngine::new(1);
    let mut bob = MergeEngine::new(2);

    // Shared starting document: "cat".
    let c = alice.local_insert('c', ElementId::HEAD).unwrap();
    let a = alice.local_insert('a', c.origin).unwrap();
    let t = alice.local_insert('t', a.origin).unwrap();
    for op in [&c, &a, &t] {
        bob.integrate(op.clone());
    }
    println!("Both start from '{}'", alice.render());

    // Alice deletes 'a' while Bob inserts 'r' after 'c'.
    let delete_a = alice.local_delete(a.origin).unwrap();
    let insert_r = bob.local_insert('r', c.origin).unwrap();
    println!("Alice deletes 'a' -> '{}'", alice.render());
    println!("Bob inserts 'r'   -> '{}'", bob.render());

    alice.integrate(insert_r);
    bob.integrate(delete_a);

    println!("Merged, Alice     -> '{}'", alice.render());
    println!("Merged, Bob       -> '{}'", bob.render());
    assert_eq!(alice.render(), "crt");
    println!("The 'a' is tombstoned, the 'r' survives, nobody lost data.\n");
}

fn scenario_out_of_order_delivery() {
    println!("=== Scenario 3: out-of-order delivery ===\n");

    let mut alice = MergeEngine::new(1);
    let mut carol = MergeEngine::new(3);

    let h = alice.local_insert('h', ElementId::HEAD).unwrap();
    let e = alice.local_insert('e', h.origin).unwrap();
    let y = alice.local_insert('y', e.origin).unwrap();

    // The network delivers Alice's typing backwards.
    println!("Carol receives 'y' first: {:?}", carol.integrate(y));
    println!("  buffered operations: {}", carol.pending_ops());
    println!("Carol receives 'e' next:  {:?}", carol.integrate(e));
    println!("  buffered operations: {}", carol.pending_ops());
    println!("Carol receives 'h' last:  {:?}", carol.integrate(h));

    println!("Carol's document  -> '{}'", carol.render());
    assert_eq!(carol.render(), "hey");
    assert_eq!(carol.pending_ops(), 0);
    println!("Causal buffering released the chain in dependency order.\n");
}

fn scenario_duplicate_delivery() {
    println!("=== Scenario 4: at-least-once delivery ===\n");

    let mut alice = MergeEngine::new(1);
    let mut bob = MergeEngine::new(2);

    let op = alice.local_insert('x', ElementId::HEAD).unwrap();

    println!("First delivery:  {:?}", bob.integrate(op.clone()));
    println!("Redelivery:      {:?}", bob.integrate(op.clone()));
    println!("Redelivery:      {:?}", bob.integrate(op));

    assert_eq!(bob.render(), "x");
    assert_eq!(bob.document().visible_count(), 1);
    println!("Bob's document   -> '{}' (exactly one 'x')", bob.render());
}
