#![allow(clippy::missing_panics_doc, clippy::significant_drop_tightening)]

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::oneshot, sync::Notify};
use url::form_urlencoded;

use crate::{
    client::{MessageQueue, DELETE_ACTION, METHOD, NO_MESSAGE_CODE, RECEIVE_ACTION, SUCCESS_CODE},
    error::{CmqError, CmqResult},
    params::{RequestParams, SIGNATURE_PARAM},
    signer,
    types::ReceivedMessage,
};

/// Path the mock server answers on
pub const MOCK_PATH: &str = "/v2/index.php";
/// Code returned when a request signature does not verify
pub const SIGNATURE_MISMATCH_CODE: i64 = 4104;
/// Code returned when deleting an unknown receipt handle
pub const INVALID_HANDLE_CODE: i64 = 4440;

/// In-process [`MessageQueue`] that replays scripted results
///
/// Once the receive script runs out every receive reports an empty queue.
/// Deletes succeed unless a failure was scripted.
#[derive(Default)]
pub struct ScriptedQueue {
    receives: Mutex<VecDeque<CmqResult<Option<ReceivedMessage>>>>,
    deletes: Mutex<VecDeque<CmqResult<()>>>,
    deleted_handles: Mutex<Vec<String>>,
    receive_calls: Mutex<usize>,
    receive_delay: Option<Duration>,
    receive_started: Arc<Notify>,
}

impl ScriptedQueue {
    /// Creates a queue with empty scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every receive take `delay` before answering
    #[must_use]
    pub fn with_receive_delay(mut self, delay: Duration) -> Self {
        self.receive_delay = Some(delay);
        self
    }

    /// Queues a message for a future receive
    pub fn push_message(&self, body: &str, receipt_handle: &str) {
        self.push_receive(Ok(Some(ReceivedMessage {
            body: body.to_string(),
            receipt_handle: receipt_handle.to_string(),
            msg_id: None,
        })));
    }

    /// Queues an arbitrary receive result
    pub fn push_receive(&self, result: CmqResult<Option<ReceivedMessage>>) {
        self.receives.lock().expect("scripted queue poisoned").push_back(result);
    }

    /// Queues the result of a future delete
    pub fn push_delete(&self, result: CmqResult<()>) {
        self.deletes.lock().expect("scripted queue poisoned").push_back(result);
    }

    /// Handles passed to `delete`, in call order
    #[must_use]
    pub fn deleted_handles(&self) -> Vec<String> {
        self.deleted_handles.lock().expect("scripted queue poisoned").clone()
    }

    /// Number of `receive` calls so far
    #[must_use]
    pub fn receive_calls(&self) -> usize {
        *self.receive_calls.lock().expect("scripted queue poisoned")
    }

    /// Notified each time a receive starts
    #[must_use]
    pub fn receive_started(&self) -> Arc<Notify> {
        Arc::clone(&self.receive_started)
    }
}

#[async_trait::async_trait]
impl MessageQueue for ScriptedQueue {
    async fn receive(&self) -> CmqResult<Option<ReceivedMessage>> {
        *self.receive_calls.lock().expect("scripted queue poisoned") += 1;
        self.receive_started.notify_one();

        if let Some(delay) = self.receive_delay {
            tokio::time::sleep(delay).await;
        }

        self.receives
            .lock()
            .expect("scripted queue poisoned")
            .pop_front()
            .unwrap_or(Ok(None))
    }

    async fn delete(&self, receipt_handle: &str) -> CmqResult<()> {
        self.deleted_handles
            .lock()
            .expect("scripted queue poisoned")
            .push(receipt_handle.to_string());

        self.deletes
            .lock()
            .expect("scripted queue poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn queue_name(&self) -> &str {
        "scripted"
    }
}

/// Builds a service error for scripting
#[must_use]
pub fn service_error(code: i64, message: &str) -> CmqError {
    CmqError::Service {
        code,
        message: message.to_string(),
    }
}

/// A request as seen by [`MockCmqServer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Value of the `Action` parameter
    pub action: String,
    /// Decoded parameters, `Signature` excluded
    pub params: BTreeMap<String, String>,
    /// Names in the order they appeared on the wire
    pub wire_order: Vec<String>,
    /// Whether the signature verified
    pub signature_valid: bool,
}

#[derive(Default)]
struct ServerState {
    secret_key: String,
    host_and_path: String,
    messages: VecDeque<(String, String)>,
    outstanding: HashSet<String>,
    receive_error: Option<(i64, String)>,
    delete_error: Option<(i64, String)>,
    raw_body: Option<String>,
    requests: Vec<RecordedRequest>,
}

type SharedState = Arc<Mutex<ServerState>>;

/// Local HTTP server speaking the CMQ receive/delete protocol
///
/// Every request's signature is recomputed from the decoded query string
/// with the configured secret key; requests that do not verify are answered
/// with [`SIGNATURE_MISMATCH_CODE`]. The server stops when dropped.
pub struct MockCmqServer {
    addr: SocketAddr,
    state: SharedState,
    _shutdown: oneshot::Sender<()>,
}

impl MockCmqServer {
    /// Starts a server on an ephemeral localhost port
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound
    pub async fn start(secret_key: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state: SharedState = Arc::new(Mutex::new(ServerState {
            secret_key: secret_key.to_string(),
            host_and_path: format!("{addr}{MOCK_PATH}"),
            ..ServerState::default()
        }));

        let app = Router::new()
            .route(MOCK_PATH, get(handle))
            .with_state(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            state,
            _shutdown: shutdown_tx,
        })
    }

    /// Endpoint URL to configure the client with
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}{MOCK_PATH}", self.addr)
    }

    /// Enqueues a message
    pub fn push_message(&self, body: &str, receipt_handle: &str) {
        self.lock()
            .messages
            .push_back((body.to_string(), receipt_handle.to_string()));
    }

    /// Makes every receive answer with the given service error
    pub fn fail_receives(&self, code: i64, message: &str) {
        self.lock().receive_error = Some((code, message.to_string()));
    }

    /// Makes every delete answer with the given service error
    pub fn fail_deletes(&self, code: i64, message: &str) {
        self.lock().delete_error = Some((code, message.to_string()));
    }

    /// Answers every request with `body` verbatim
    pub fn respond_with_raw(&self, body: &str) {
        self.lock().raw_body = Some(body.to_string());
    }

    /// All requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests received for `action`
    #[must_use]
    pub fn count(&self, action: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.action == action)
            .count()
    }

    /// Receipt handles delivered but not yet deleted
    #[must_use]
    pub fn outstanding_handles(&self) -> HashSet<String> {
        self.lock().outstanding.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().expect("mock server state poisoned")
    }
}

async fn handle(State(state): State<SharedState>, RawQuery(query): RawQuery) -> Response {
    let mut state = state.lock().expect("mock server state poisoned");

    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .into_owned()
        .collect();

    let mut params = RequestParams::new();
    let mut signature = None;
    for (name, value) in &pairs {
        if name == SIGNATURE_PARAM {
            signature = Some(value.clone());
        } else {
            params.insert(name.clone(), value.clone());
        }
    }

    let expected = signer::sign(METHOD, &state.host_and_path, &state.secret_key, &params).ok();
    let signature_valid = signature.is_some() && signature == expected;
    let action = params
        .get("Action")
        .map(ToString::to_string)
        .unwrap_or_default();

    state.requests.push(RecordedRequest {
        action: action.clone(),
        params: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        wire_order: pairs.iter().map(|(k, _)| k.clone()).collect(),
        signature_valid,
    });

    if let Some(raw) = &state.raw_body {
        return (StatusCode::OK, raw.clone()).into_response();
    }

    if !signature_valid {
        return cmq_json(json!({
            "code": SIGNATURE_MISMATCH_CODE,
            "message": "signature mismatch",
        }));
    }

    match action.as_str() {
        RECEIVE_ACTION => {
            if let Some((code, message)) = &state.receive_error {
                return cmq_json(json!({ "code": code, "message": message }));
            }
            match state.messages.pop_front() {
                Some((body, handle)) => {
                    state.outstanding.insert(handle.clone());
                    cmq_json(json!({
                        "code": SUCCESS_CODE,
                        "message": "",
                        "requestId": "mock-request",
                        "msgId": format!("msg-{handle}"),
                        "msgBody": body,
                        "receiptHandle": handle,
                    }))
                }
                None => cmq_json(json!({
                    "code": NO_MESSAGE_CODE,
                    "message": "no message",
                })),
            }
        }
        DELETE_ACTION => {
            if let Some((code, message)) = &state.delete_error {
                return cmq_json(json!({ "code": code, "message": message }));
            }
            let handle = params
                .get("receiptHandle")
                .map(ToString::to_string)
                .unwrap_or_default();
            if state.outstanding.remove(&handle) {
                cmq_json(json!({ "code": SUCCESS_CODE, "message": "" }))
            } else {
                cmq_json(json!({
                    "code": INVALID_HANDLE_CODE,
                    "message": "invalid receiptHandle",
                }))
            }
        }
        _ => cmq_json(json!({ "code": 4000, "message": "unknown action" })),
    }
}

fn cmq_json(body: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}
