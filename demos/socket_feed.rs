//! Feed a loopback channel with field updates and merge them last-write-wins.
//!
//! Run with: cargo run --example socket_feed

use plexus_stream::connectors::{LoopbackChannel, SocketConfig, SocketConnector};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Deserialize)]
struct FieldUpdate {
    node: String,
    field: String,
    value: serde_json::Value,
    clock: u64,
}

fn main() {
    let connector = SocketConnector::new(LoopbackChannel::new(), SocketConfig::default());

    // Last write wins per (node, field), decided by the update clock.
    let merged: Rc<RefCell<HashMap<(String, String), (u64, serde_json::Value)>>> =
        Rc::new(RefCell::new(HashMap::new()));

    let sink = Rc::clone(&merged);
    let subscription = connector.messages::<FieldUpdate>().for_each(move |update| {
        let key = (update.node.clone(), update.field.clone());
        let mut state = sink.borrow_mut();
        match state.get(&key) {
            Some((clock, _)) if *clock >= update.clock => {
                println!(
                    "  stale update for {}/{} (clock {}), keeping current value",
                    key.0, key.1, update.clock
                );
            }
            _ => {
                println!(
                    "  applying {}/{} = {} (clock {})",
                    key.0, key.1, update.value, update.clock
                );
                state.insert(key, (update.clock, update.value));
            }
        }
    });

    let channel = connector.channel();
    channel.open();

    println!("pushing updates:");
    channel.push_text(r#"{"node":"user:1","field":"name","value":"Ada","clock":1}"#);
    channel.push_text(r#"{"node":"user:1","field":"name","value":"Grace","clock":3}"#);
    channel.push_text(r#"{"node":"user:1","field":"name","value":"Old","clock":2}"#);
    channel.push_text(r#"{"node":"user:2","field":"score","value":42,"clock":1}"#);
    channel.push_text("this is not json and gets skipped");
    channel.push_text(r#"{"node":"user:2","field":"score","value":99,"clock":5}"#);

    println!("\nmerged state:");
    let state = merged.borrow();
    let mut entries: Vec<_> = state.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for ((node, field), (clock, value)) in entries {
        println!("  {}/{} = {} (clock {})", node, field, value, clock);
    }

    subscription.dispose();
}
