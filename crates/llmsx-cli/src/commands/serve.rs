//! `llmsx serve`: extraction and admin requests as JSON lines over stdio.
//!
//! One request per line on stdin, one response per line on stdout:
//!
//! ```text
//! → {"id":1,"method":"extract","params":{"url":"hono.dev","client":"agent-7"}}
//! ← {"id":1,"result":{"url":"https://hono.dev","sourceUrl":"https://hono.dev/llms-full.txt",...}}
//! → {"id":2,"method":"stats","params":{"key":"secret"}}
//! ← {"id":2,"result":{"cache":{"extraction":{...},"validation":{...}},"rateLimiter":{...},...}}
//! → {"id":3,"method":"clear","params":{"rateLimiter":true}}
//! ← {"id":3,"error":{"code":-32001,"category":"unauthorized","message":"..."}}
//! ```
//!
//! Methods: `extract {url, client?}`, `check {url, client?}`, `stats`,
//! `prune`, `clear {rateLimiter?}`. The admin methods (`stats`, `prune`,
//! `clear`) take a `key` param that must match `admin.key` when one is
//! configured.
//!
//! Each request runs on its own task, so a slow extraction never blocks
//! the admin methods. Responses are written as they complete and may
//! arrive out of order; match them to requests by `id`.

use std::sync::Arc;

use anyhow::Result;
use llmsx_core::{ClearScope, Config, Service};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Client key used when a request does not name one.
pub const DEFAULT_CLIENT: &str = "stdio";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const SERVICE_ERROR: i32 = -32000;
const UNAUTHORIZED: i32 = -32001;

/// Errors a request can fail with.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The line is not JSON.
    #[error("parse error: {0}")]
    Parse(serde_json::Error),

    /// JSON, but not a request object.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown method name.
    #[error("unknown method: {0}")]
    MethodNotFound(String),

    /// Params missing or of the wrong shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Admin method called without the configured key.
    #[error("admin key missing or invalid")]
    Unauthorized,

    /// Result could not be encoded.
    #[error("internal error: {0}")]
    Internal(String),

    /// The service rejected or failed the request.
    #[error(transparent)]
    Service(#[from] llmsx_core::Error),
}

impl ServeError {
    /// Numeric error code, JSON-RPC style.
    pub const fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Unauthorized => UNAUTHORIZED,
            Self::Internal(_) => INTERNAL_ERROR,
            Self::Service(_) => SERVICE_ERROR,
        }
    }

    /// Stable category string.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MethodNotFound(_) => "method_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal",
            Self::Service(err) => err.category(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: i32,
    category: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

impl From<&ServeError> for ErrorBody {
    fn from(err: &ServeError) -> Self {
        let (remaining, retry_after_ms) = match err {
            ServeError::Service(llmsx_core::Error::RateLimited {
                remaining,
                reset_after,
                ..
            }) => (
                Some(*remaining),
                Some(u64::try_from(reset_after.as_millis()).unwrap_or(u64::MAX)),
            ),
            _ => (None, None),
        };

        Self {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            remaining,
            retry_after_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TargetParams {
    url: String,
    client: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminParams {
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearParams {
    #[serde(default)]
    rate_limiter: bool,
    key: Option<String>,
}

/// Request dispatcher over one [`Service`].
#[derive(Debug)]
pub struct Server {
    service: Service,
    admin_key: Option<String>,
}

impl Server {
    /// Create a dispatcher; admin methods require `admin_key` when set.
    pub const fn new(service: Service, admin_key: Option<String>) -> Self {
        Self { service, admin_key }
    }

    /// The wrapped service.
    pub const fn service(&self) -> &Service {
        &self.service
    }

    /// Handle one request line and return the response line.
    pub async fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Value>(line) {
            Err(err) => failure(Value::Null, &ServeError::Parse(err)),
            Ok(raw) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<Request>(raw) {
                    Err(err) => failure(id, &ServeError::InvalidRequest(err.to_string())),
                    Ok(request) => {
                        debug!(method = %request.method, "serve request");
                        match self.dispatch(&request.method, request.params).await {
                            Ok(result) => Response {
                                id: request.id,
                                result: Some(result),
                                error: None,
                            },
                            Err(err) => failure(request.id, &err),
                        }
                    },
                }
            },
        };

        serde_json::to_string(&response).unwrap_or_else(|err| {
            json!({
                "id": Value::Null,
                "error": {"code": INTERNAL_ERROR, "category": "internal", "message": err.to_string()},
            })
            .to_string()
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ServeError> {
        match method {
            "extract" => {
                let params: TargetParams = parse_params(params)?;
                let client = params.client.as_deref().unwrap_or(DEFAULT_CLIENT);
                encode(&self.service.extract(client, &params.url).await?)
            },
            "check" => {
                let params: TargetParams = parse_params(params)?;
                let client = params.client.as_deref().unwrap_or(DEFAULT_CLIENT);
                encode(&self.service.check_manifest(client, &params.url).await?)
            },
            "stats" => {
                let params: AdminParams = parse_params(params)?;
                self.authorize(params.key.as_deref())?;
                encode(&self.service.admin().snapshot().await)
            },
            "prune" => {
                let params: AdminParams = parse_params(params)?;
                self.authorize(params.key.as_deref())?;
                encode(&self.service.admin().prune_all().await)
            },
            "clear" => {
                let params: ClearParams = parse_params(params)?;
                self.authorize(params.key.as_deref())?;
                let scope = ClearScope {
                    rate_limiter: params.rate_limiter,
                };
                encode(&self.service.admin().clear_all(scope).await)
            },
            other => Err(ServeError::MethodNotFound(other.to_string())),
        }
    }

    fn authorize(&self, presented: Option<&str>) -> Result<(), ServeError> {
        let Some(expected) = self.admin_key.as_deref() else {
            return Ok(());
        };
        let matches = presented
            .is_some_and(|key| bool::from(key.as_bytes().ct_eq(expected.as_bytes())));
        if matches {
            Ok(())
        } else {
            warn!("rejected admin request with missing or wrong key");
            Err(ServeError::Unauthorized)
        }
    }
}

fn failure(id: Value, err: &ServeError) -> Response {
    Response {
        id,
        result: None,
        error: Some(ErrorBody::from(err)),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ServeError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| ServeError::InvalidParams(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ServeError> {
    serde_json::to_value(value).map_err(|e| ServeError::Internal(e.to_string()))
}

/// Read requests from `reader` until EOF, writing one response line per
/// request to `writer` as each completes.
///
/// Returns once stdin is exhausted and every in-flight request answered.
pub async fn serve<R, W>(server: Arc<Server>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let read = async move {
        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = JoinSet::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let server = Arc::clone(&server);
            let tx = tx.clone();
            in_flight.spawn(async move {
                let response = server.handle_line(&line).await;
                // The writer only goes away after a write error.
                let _ = tx.send(response);
            });
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "serve request task failed");
            }
        }
        Ok::<(), std::io::Error>(())
    };

    let write = async {
        while let Some(response) = rx.recv().await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    };

    let (read, write) = tokio::join!(read, write);
    read?;
    write?;
    Ok(())
}

/// Run the stdio server with background maintenance until stdin closes.
pub async fn execute(config: Config) -> Result<()> {
    let interval = config.maintenance.prune_interval();
    let admin_key = config.admin.key.clone();
    let service = Service::new(config)?;
    let maintenance = service.spawn_maintenance(interval);

    info!(
        prune_interval_ms = interval.as_millis(),
        admin_key = admin_key.is_some(),
        "llmsx serve listening on stdio"
    );
    let server = Arc::new(Server::new(service, admin_key));
    let outcome = serve(server, tokio::io::stdin(), tokio::io::stdout()).await;

    maintenance.abort();
    info!("llmsx serve stopped");
    outcome
}
