//! Gremlin Server client over WebSocket.
//!
//! Requests are `eval` ops carrying the rendered traversal and its
//! bindings, framed as binary messages with the GraphSON mime header.
//! Authentication is SASL PLAIN, answered when the server challenges the
//! first request with status 407.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use super::graphson::untype;
use super::query::probe_query;
use super::transport::GraphTransport;
use super::traversal::Query;
use crate::error::GraphError;

const MIME_TYPE: &str = "application/vnd.gremlin-v2.0+json";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Plaintext credentials for the SASL handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Cosmos-style credentials scoped to one database/collection pair.
    pub fn for_collection(database: &str, collection: &str, key: &str) -> Self {
        Self {
            username: format!("/dbs/{}/colls/{}", database, collection),
            password: key.to_string(),
        }
    }

    fn sasl_plain(&self) -> String {
        STANDARD.encode(format!("\0{}\0{}", self.username, self.password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    #[serde(rename = "requestId")]
    request_id: String,
    op: &'a str,
    processor: &'a str,
    args: Json,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    status: ResponseStatus,
    #[serde(default)]
    result: Option<ResponseResult>,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseResult {
    #[serde(default)]
    data: Json,
}

fn eval_request(
    request_id: &Uuid,
    query: &Query,
    traversal_source: &str,
) -> RequestMessage<'static> {
    RequestMessage {
        request_id: request_id.to_string(),
        op: "eval",
        processor: "",
        args: json!({
            "gremlin": query.text(),
            "bindings": query.bindings,
            "language": "gremlin-groovy",
            "aliases": { "g": traversal_source },
        }),
    }
}

fn auth_request(request_id: &Uuid, credentials: &Credentials) -> RequestMessage<'static> {
    RequestMessage {
        request_id: request_id.to_string(),
        op: "authentication",
        processor: "",
        args: json!({
            "sasl": credentials.sasl_plain(),
            "saslMechanism": "PLAIN",
        }),
    }
}

/// Prefix a request body with the length-prefixed mime type header.
fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + MIME_TYPE.len() + body.len());
    frame.push(MIME_TYPE.len() as u8);
    frame.extend_from_slice(MIME_TYPE.as_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Append a response page to the collected rows.
fn collect_rows(rows: &mut Vec<Json>, data: Json) {
    match untype(data) {
        Json::Array(items) => rows.extend(items),
        Json::Null => {}
        other => rows.push(other),
    }
}

pub struct GremlinClient {
    url: String,
    traversal_source: String,
    credentials: Option<Credentials>,
    socket: Option<Socket>,
}

impl GremlinClient {
    pub fn new(url: &str, traversal_source: &str, credentials: Option<Credentials>) -> Self {
        Self {
            url: url.to_string(),
            traversal_source: traversal_source.to_string(),
            credentials,
            socket: None,
        }
    }

    async fn send(
        socket: &mut Socket,
        url: &str,
        request: &RequestMessage<'_>,
    ) -> Result<(), GraphError> {
        let body = serde_json::to_vec(request)?;
        socket
            .send(Message::binary(encode_frame(&body)))
            .await
            .map_err(|e| GraphError::connectivity(url, e))
    }

    async fn receive(socket: &mut Socket, url: &str) -> Result<ResponseMessage, GraphError> {
        loop {
            let message = socket
                .next()
                .await
                .ok_or_else(|| GraphError::connectivity(url, "connection closed by server"))?
                .map_err(|e| GraphError::connectivity(url, e))?;
            let response = match message {
                Message::Binary(bytes) => serde_json::from_slice(&bytes)?,
                Message::Text(text) => serde_json::from_str(text.as_str())?,
                Message::Close(_) => {
                    return Err(GraphError::connectivity(url, "connection closed by server"))
                }
                _ => continue,
            };
            return Ok(response);
        }
    }
}

#[async_trait]
impl GraphTransport for GremlinClient {
    async fn open(&mut self) -> Result<(), GraphError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| GraphError::connectivity(&self.url, e))?;
        self.socket = Some(socket);

        // Gremlin Server only challenges on the first request, so push one
        // through now to surface bad credentials here rather than mid-run.
        if let Err(e) = self.submit(&probe_query()).await {
            self.socket = None;
            return Err(match e {
                GraphError::Connectivity { .. } => e,
                other => GraphError::connectivity(&self.url, other),
            });
        }
        Ok(())
    }

    async fn submit(&mut self, query: &Query) -> Result<Vec<Json>, GraphError> {
        let Self {
            url,
            traversal_source,
            credentials,
            socket,
        } = self;
        let socket = socket.as_mut().ok_or(GraphError::NotConnected)?;

        let request_id = Uuid::new_v4();
        Self::send(socket, url, &eval_request(&request_id, query, traversal_source)).await?;

        let mut rows = Vec::new();
        loop {
            let response = Self::receive(socket, url).await?;
            match response.status.code {
                200 | 206 => {
                    if let Some(result) = response.result {
                        collect_rows(&mut rows, result.data);
                    }
                    if response.status.code == 200 {
                        return Ok(rows);
                    }
                }
                204 => return Ok(rows),
                407 => {
                    let credentials = credentials.as_ref().ok_or_else(|| GraphError::Server {
                        code: 407,
                        message: "server requires authentication but no credentials are configured"
                            .to_string(),
                    })?;
                    Self::send(socket, url, &auth_request(&request_id, credentials)).await?;
                }
                code => {
                    return Err(GraphError::Server {
                        code,
                        message: response.status.message,
                    })
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), GraphError> {
        if let Some(mut socket) = self.socket.take() {
            socket
                .close(None)
                .await
                .map_err(|e| GraphError::connectivity(&self.url, e))?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
