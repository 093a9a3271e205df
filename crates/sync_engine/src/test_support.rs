//! In-memory backend for coordinator tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sync_net::{Envelope, Failure, Query, Reply, ResourceApi, encode};

use crate::config::SyncConfig;
use crate::coordinator::Coordinator;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    List { collection: String, query: String },
    Get { collection: String, id: u64 },
    Patch { collection: String, id: u64, partial: Value },
    Post { collection: String, body: Value },
}

/// A scripted backend holding entities by id.
#[derive(Debug, Default)]
pub(crate) struct MockApi {
    entities: Mutex<BTreeMap<u64, Value>>,
    list_plan: Mutex<VecDeque<(Duration, Envelope)>>,
    latency: Mutex<Duration>,
    fail_writes: AtomicBool,
    calls: Mutex<Vec<Call>>,
    completed: AtomicUsize,
}

impl MockApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store an entity on the fake server.
    pub(crate) fn insert(&self, entity: Value) {
        let id = entity["id"].as_u64().unwrap();
        self.entities.lock().insert(id, entity);
    }

    /// Queue the response of the next unscripted list call.
    pub(crate) fn script_list(&self, latency: Duration, envelope: Envelope) {
        self.list_plan.lock().push_back((latency, envelope));
    }

    /// Latency of get, patch, and post calls.
    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Make patch and post answer with HTTP 500.
    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn list_queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::List { query, .. } => Some(query),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn gets(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Get { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn patches(&self) -> Vec<(u64, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Patch { id, partial, .. } => Some((id, partial)),
                _ => None,
            })
            .collect()
    }

    /// Number of calls whose response has been produced, whether or not the
    /// caller was still waiting for it.
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn respond(&self, latency: Duration, envelope: Envelope) -> Envelope {
        tokio::time::sleep(latency).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        envelope
    }

    fn write_latency(&self) -> Duration {
        *self.latency.lock()
    }
}

pub(crate) fn ok(data: Value) -> Envelope {
    Envelope::Response(Reply {
        status: 200,
        url: "/api/mock/".to_string(),
        data,
    })
}

fn api_error(status: u16, data: Value) -> Envelope {
    Envelope::Error(Failure::Api(Reply {
        status,
        url: "/api/mock/".to_string(),
        data,
    }))
}

#[async_trait]
impl ResourceApi for MockApi {
    async fn list(&self, collection: &str, attrs: &Query) -> Envelope {
        self.calls.lock().push(Call::List {
            collection: collection.to_string(),
            query: encode(attrs),
        });
        let scripted = self.list_plan.lock().pop_front();
        let (latency, envelope) = scripted.unwrap_or_else(|| {
            let all: Vec<Value> = self.entities.lock().values().cloned().collect();
            (Duration::ZERO, ok(Value::Array(all)))
        });
        self.respond(latency, envelope).await
    }

    async fn get(&self, collection: &str, id: u64) -> Envelope {
        self.calls.lock().push(Call::Get {
            collection: collection.to_string(),
            id,
        });
        let found = self.entities.lock().get(&id).cloned();
        let envelope = match found {
            Some(entity) => ok(entity),
            None => api_error(404, serde_json::json!({"detail": "Not found."})),
        };
        self.respond(self.write_latency(), envelope).await
    }

    async fn patch(&self, collection: &str, id: u64, partial: &Value) -> Envelope {
        self.calls.lock().push(Call::Patch {
            collection: collection.to_string(),
            id,
            partial: partial.clone(),
        });
        let envelope = if self.fail_writes.load(Ordering::SeqCst) {
            api_error(500, serde_json::json!({"detail": "Server error."}))
        } else {
            let mut entities = self.entities.lock();
            match (entities.get_mut(&id), partial) {
                (Some(Value::Object(fields)), Value::Object(changes)) => {
                    for (key, value) in changes {
                        fields.insert(key.clone(), value.clone());
                    }
                    ok(Value::Object(fields.clone()))
                }
                _ => api_error(404, serde_json::json!({"detail": "Not found."})),
            }
        };
        self.respond(self.write_latency(), envelope).await
    }

    async fn post(&self, collection: &str, body: &Value) -> Envelope {
        self.calls.lock().push(Call::Post {
            collection: collection.to_string(),
            body: body.clone(),
        });
        let envelope = if self.fail_writes.load(Ordering::SeqCst) {
            api_error(500, serde_json::json!({"detail": "Server error."}))
        } else {
            let mut entities = self.entities.lock();
            let id = entities.keys().next_back().copied().unwrap_or(0) + 1;
            let mut created = body.clone();
            created["id"] = Value::from(id);
            entities.insert(id, created.clone());
            Envelope::Response(Reply {
                status: 201,
                url: "/api/mock/".to_string(),
                data: created,
            })
        };
        self.respond(self.write_latency(), envelope).await
    }
}

/// Start a coordinator with the default rules against `api`.
pub(crate) fn start(api: &Arc<MockApi>) -> Coordinator {
    let api: Arc<dyn ResourceApi> = Arc::clone(api) as Arc<dyn ResourceApi>;
    Coordinator::start(api, SyncConfig::default()).unwrap()
}

/// Let every pending task and timer run to completion.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

/// Advance virtual time by `ms` milliseconds.
pub(crate) async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
