//! WebSocket client for one adapter connection, using tokio-tungstenite.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mmi_domain::{
    AdapterDescription, AdapterError, AvatarDescription, BoolResponse, Checkpoint, Constraint,
    Instruction, MmuDescription, SceneObject, SceneUpdate, SimulationResult, SimulationState,
};
use mmi_shared::{AdapterCall, AdapterReply, AdapterService, ClientMessage};

use super::pending::PendingRequests;
use super::shared::{parse_server_message, ParsedServerMessage};
use crate::ports::AdapterClient;

/// Buffer size for the outbound message channel.
const OUTBOUND_BUFFER: usize = 32;

/// RPC client over a single WebSocket connection.
///
/// Requests may be issued concurrently; responses are matched by request id.
/// Dropping the client closes the connection.
pub struct RemoteAdapterClient {
    url: String,
    tx: mpsc::Sender<ClientMessage>,
    pending: Arc<Mutex<PendingRequests>>,
    request_timeout: Duration,
    closed: CancellationToken,
}

impl RemoteAdapterClient {
    /// Open a connection to the adapter endpoint at `url`.
    pub async fn connect(
        url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let url = url.into();
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AdapterError::transport(format!("cannot connect to {url}: {e}")))?;
        tracing::debug!(url = %url, "Connected to adapter");

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientMessage>(OUTBOUND_BUFFER);
        let pending = Arc::new(Mutex::new(PendingRequests::default()));
        let closed = CancellationToken::new();

        let reader_pending = Arc::clone(&pending);
        let reader_closed = closed.clone();
        let reader_url = url.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = reader_closed.cancelled() => break,
                    frame = read.next() => frame,
                };
                match frame {
                    Some(Ok(Message::Text(text))) => match parse_server_message(&text) {
                        Ok(ParsedServerMessage::Response { request_id, result }) => {
                            if !reader_pending.lock().resolve(&request_id, result) {
                                tracing::debug!(%request_id, "Response for unknown or expired request");
                            }
                        }
                        Ok(ParsedServerMessage::Pong) => {}
                        Ok(ParsedServerMessage::Error(e)) => {
                            tracing::warn!(url = %reader_url, error = %e, "Adapter rejected a frame");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to parse server message");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(url = %reader_url, "Adapter closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(url = %reader_url, error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            // cancel before clearing: requests registered later see the flag
            reader_closed.cancel();
            let count = reader_pending.lock().clear();
            if count > 0 {
                tracing::debug!(count, "Cleared pending requests on disconnect");
            }
        });

        let writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_closed.cancelled() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    msg = rx.recv() => {
                        let Some(msg) = msg else { break };
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to serialize WebSocket message");
                                continue;
                            }
                        };
                        if let Err(e) = write.send(Message::Text(json)).await {
                            tracing::warn!(error = %e, "Failed to send message");
                            writer_closed.cancel();
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            url,
            tx,
            pending,
            request_timeout,
            closed,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    fn closed_error(&self) -> AdapterError {
        AdapterError::transport(format!("connection to {} closed", self.url))
    }

    /// Send one call and await its reply.
    ///
    /// On timeout the pending entry is removed so a late response is dropped.
    pub async fn request(&self, call: AdapterCall) -> Result<AdapterReply, AdapterError> {
        let request_id = Uuid::new_v4().to_string();
        let method = call.method();
        let (response_tx, response_rx) = oneshot::channel();

        self.pending.lock().insert(request_id.clone(), response_tx);
        if self.closed.is_cancelled() {
            self.pending.lock().remove(&request_id);
            return Err(self.closed_error());
        }

        let message = ClientMessage::Request {
            request_id: request_id.clone(),
            call,
        };
        if self.tx.send(message).await.is_err() {
            self.pending.lock().remove(&request_id);
            return Err(self.closed_error());
        }

        match tokio::time::timeout(self.request_timeout, response_rx).await {
            Ok(Ok(result)) => result.into_result(),
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                tracing::debug!(
                    %request_id,
                    method,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Request expired, pending entry dropped"
                );
                Err(AdapterError::Timeout(format!(
                    "{method} to {} after {}ms",
                    self.url,
                    self.request_timeout.as_millis()
                )))
            }
        }
    }
}

impl Drop for RemoteAdapterClient {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

#[async_trait]
impl AdapterClient for RemoteAdapterClient {
    fn access(&self) -> &dyn AdapterService {
        self
    }

    async fn close(&self) {
        RemoteAdapterClient::close(self);
    }
}

#[async_trait]
impl AdapterService for RemoteAdapterClient {
    async fn create_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::CreateSession {
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn close_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::CloseSession {
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn get_loadable_mmus(
        &self,
        session_id: &str,
    ) -> Result<Vec<MmuDescription>, AdapterError> {
        self.request(AdapterCall::GetLoadableMmus {
            session_id: session_id.to_string(),
        })
        .await?
        .into_descriptions()
    }

    async fn get_mmus(&self, session_id: &str) -> Result<Vec<MmuDescription>, AdapterError> {
        self.request(AdapterCall::GetMmus {
            session_id: session_id.to_string(),
        })
        .await?
        .into_descriptions()
    }

    async fn load_mmus(
        &self,
        unit_ids: Vec<String>,
        session_id: &str,
    ) -> Result<HashMap<String, String>, AdapterError> {
        self.request(AdapterCall::LoadMmus {
            unit_ids,
            session_id: session_id.to_string(),
        })
        .await?
        .into_instances()
    }

    async fn initialize(
        &self,
        avatar_description: AvatarDescription,
        properties: HashMap<String, String>,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::Initialize {
            avatar_description,
            properties,
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn assign_instruction(
        &self,
        instruction: Instruction,
        simulation_state: SimulationState,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::AssignInstruction {
            instruction,
            simulation_state,
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn do_step(
        &self,
        time: f64,
        simulation_state: SimulationState,
        unit_id: &str,
        session_id: &str,
    ) -> Result<SimulationResult, AdapterError> {
        self.request(AdapterCall::DoStep {
            time,
            simulation_state,
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_simulation()
    }

    async fn abort(
        &self,
        instruction_id: &str,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::Abort {
            instruction_id: instruction_id.to_string(),
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn check_prerequisites(
        &self,
        instruction: Instruction,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::CheckPrerequisites {
            instruction,
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn get_boundary_constraints(
        &self,
        instruction: Instruction,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Vec<Constraint>, AdapterError> {
        self.request(AdapterCall::GetBoundaryConstraints {
            instruction,
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_constraints()
    }

    async fn create_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Checkpoint, AdapterError> {
        self.request(AdapterCall::CreateCheckpoint {
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_checkpoint()
    }

    async fn restore_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::RestoreCheckpoint {
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
            checkpoint,
        })
        .await?
        .into_bool()
    }

    async fn execute_function(
        &self,
        name: &str,
        parameters: HashMap<String, String>,
        unit_id: &str,
        session_id: &str,
    ) -> Result<HashMap<String, String>, AdapterError> {
        self.request(AdapterCall::ExecuteFunction {
            name: name.to_string(),
            parameters,
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_properties()
    }

    async fn dispose(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::Dispose {
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn get_description(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<MmuDescription, AdapterError> {
        self.request(AdapterCall::GetDescription {
            unit_id: unit_id.to_string(),
            session_id: session_id.to_string(),
        })
        .await?
        .into_description()
    }

    async fn push_scene(
        &self,
        scene_update: SceneUpdate,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.request(AdapterCall::PushScene {
            scene_update,
            session_id: session_id.to_string(),
        })
        .await?
        .into_bool()
    }

    async fn get_scene(&self, session_id: &str) -> Result<Vec<SceneObject>, AdapterError> {
        self.request(AdapterCall::GetScene {
            session_id: session_id.to_string(),
        })
        .await?
        .into_scene_objects()
    }

    async fn get_scene_changes(&self, session_id: &str) -> Result<SceneUpdate, AdapterError> {
        self.request(AdapterCall::GetSceneChanges {
            session_id: session_id.to_string(),
        })
        .await?
        .into_scene_update()
    }

    async fn get_status(&self) -> Result<HashMap<String, String>, AdapterError> {
        self.request(AdapterCall::GetStatus).await?.into_properties()
    }

    async fn get_adapter_description(&self) -> Result<AdapterDescription, AdapterError> {
        self.request(AdapterCall::GetAdapterDescription)
            .await?
            .into_adapter_description()
    }
}
