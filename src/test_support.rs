//! Scripted transport and fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::error::ApiError;
use crate::http::{ApiRequest, Method, RawResponse, Transport};
use crate::storage::{ACCESS_TOKEN_KEY, CURRENT_USER_KEY, MemoryStorage, SessionStorage};

/// Scripted reply for one request.
#[derive(Clone, Debug)]
pub enum Reply {
    Status(u16, Value),
    NetworkDown,
}

/// Transport that answers from per-route queues and records every request.
///
/// The last reply queued for a route is sticky: it keeps being returned
/// once the queue is down to one entry. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last(&self, method: Method, path: &str) -> Option<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let key = (request.method, request.path.clone());
        self.requests.lock().unwrap().push(request);

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Status(status, body)) => Ok(RawResponse { status, body: body.to_string() }),
            Some(Reply::NetworkDown) => Err(ApiError::Network("connection refused".into())),
            None => Ok(RawResponse { status: 404, body: json!({ "code": 404, "message": "not found" }).to_string() }),
        }
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

pub fn ok(data: Value) -> Reply {
    Reply::Status(200, json!({ "code": 0, "message": "success", "data": data }))
}

pub fn rejected(code: i64, message: &str) -> Reply {
    Reply::Status(200, json!({ "code": code, "message": message, "data": null }))
}

pub fn status(status: u16, message: &str) -> Reply {
    Reply::Status(status, json!({ "code": status, "message": message, "data": null }))
}

pub fn user_json(role: &str) -> Value {
    json!({ "user_id": 7, "username": "alice", "email": "alice@example.test", "user_role": role })
}

pub fn login_ok(token: &str, role: &str) -> Reply {
    ok(json!({ "token": token, "user": user_json(role) }))
}

/// Storage holding a token but no cached user, as after a restart where the
/// profile was never fetched.
pub fn storage_with_token(token: &str) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, token).unwrap();
    storage.set(CURRENT_USER_KEY, "null").unwrap();
    storage
}
