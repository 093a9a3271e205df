//! Stdin event loop for the `run` command.

use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use sync_engine::{Coordinator, Dispatched, Event, EventKind, EventStream};
use sync_store::Collection;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Feed stdin lines into `coordinator` until EOF, then keep reporting
/// outcomes for `linger` so in-flight requests can land.
pub async fn run(coordinator: &Coordinator, linger: Duration) -> Result<()> {
    let mut events = coordinator.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => submit(coordinator, &line),
                None => break,
            },
            Some(dispatched) = events.next() => report(coordinator, &dispatched),
        }
    }

    info!(linger_ms = linger.as_millis() as u64, "stdin closed, draining");
    let _ = tokio::time::timeout(linger, drain(coordinator, &mut events)).await;
    Ok(())
}

async fn drain(coordinator: &Coordinator, events: &mut EventStream) {
    while let Some(dispatched) = events.next().await {
        report(coordinator, &dispatched);
    }
}

fn submit(coordinator: &Coordinator, line: &str) {
    let Some(event) = parse_line(line) else {
        return;
    };
    match coordinator.emit(event) {
        Ok(seq) => debug!(seq, "event emitted"),
        Err(e) => warn!(error = %e, "event rejected"),
    }
}

/// Parse one input line. Blank lines and `#` comments are skipped.
fn parse_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "ignoring malformed event");
            None
        }
    }
}

fn is_outcome(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::ItemsFetched
            | EventKind::EntityAdded
            | EventKind::ItemPatched
            | EventKind::RequestFailed
    )
}

fn report(coordinator: &Coordinator, dispatched: &Dispatched) {
    let kind = dispatched.event.kind();
    if !is_outcome(kind) {
        return;
    }
    let Some(name) = dispatched.event.collection() else {
        return;
    };
    let Some(collection) = coordinator.snapshot(name) else {
        return;
    };
    info!(
        seq = dispatched.seq,
        ?kind,
        collection = %name,
        entities = collection.len(),
        "store updated"
    );
    println!("{}", summarize(dispatched.seq, kind, &collection));
}

/// One-line JSON view of a collection after the event `seq`.
fn summarize(seq: u64, kind: EventKind, collection: &Collection) -> Value {
    let selected = collection.selected();
    json!({
        "seq": seq,
        "event": format!("{kind:?}"),
        "collection": collection.name(),
        "status": format!("{:?}", collection.pending().status).to_lowercase(),
        "query": serde_json::to_value(collection.query()).unwrap_or(Value::Null),
        "results": collection.results().map(|e| e.id().id()).collect::<Vec<_>>(),
        "selected": selected.is_some().then(|| selected.id()),
        "entities": collection.entities().map(|e| e.to_json()).collect::<Vec<_>>(),
        "error": collection.last_error().map(|f| f.to_json()),
    })
}
