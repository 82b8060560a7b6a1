//! JSON-RPC over stdin/stdout.
//!
//! Each request is handled on its own task, so a long `rebuildIndex`
//! doesn't hold up searches. Responses may therefore arrive out of
//! order; clients match them by `id`.

use crate::engine::{Engine, SearchOptions};
use crate::protocol::{
    Notification, RecentSearchParams, Request, Response, RpcError, SearchParams, JSONRPC_VERSION,
};
use findex_core::Settings;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct RpcServer {
    engine: Engine,
}

impl RpcServer {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Serves until stdin closes. Index events are forwarded as notifications.
    pub async fn run_stdio(&self) -> io::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = rx.recv().await {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Ok::<_, io::Error>(())
        });

        let forwarder = {
            let mut events = self.engine.subscribe();
            let tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            let note = Notification::from_event(&event);
                            match serde_json::to_string(&note) {
                                Ok(line) => {
                                    if tx.send(line).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Failed to encode notification: {}", e),
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Dropped {} index events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        info!("Serving JSON-RPC on stdio");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_line(&line).await {
                    match serde_json::to_string(&response) {
                        Ok(json) => {
                            let _ = tx.send(json);
                        }
                        Err(e) => warn!("Failed to encode response: {}", e),
                    }
                }
            });
        }

        info!("stdin closed, shutting down");
        forwarder.abort();
        drop(tx);
        match writer.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }

    /// Handles one raw line. None for notifications (requests without id).
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!("Unparseable request: {}", e);
                Some(Response::err(None, RpcError::parse_error(e)))
            }
        }
    }

    pub async fn handle(&self, request: Request) -> Option<Response> {
        let Request {
            jsonrpc,
            id,
            method,
            params,
        } = request;
        if jsonrpc != JSONRPC_VERSION {
            return Some(Response::err(
                id,
                RpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let outcome = self.dispatch(&method, params).await;
        if let Err(e) = &outcome {
            debug!("{} failed: {}", method, e);
        }
        // Notifications run but are never answered.
        let id = id?;
        Some(match outcome {
            Ok(result) => Response::ok(Some(id), result),
            Err(error) => Response::err(Some(id), error),
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let engine = &self.engine;

        match method {
            "search" => {
                let params: SearchParams = parse_params(params)?;
                let defaults = SearchOptions::from_settings(&engine.settings());
                let options = SearchOptions {
                    limit: params.limit.unwrap_or(defaults.limit),
                    directories_only: params.directories_only.unwrap_or(defaults.directories_only),
                };
                let hits = engine.search_with(&params.query, options).await;
                Ok(json!(hits))
            }
            "getIndexStatus" => Ok(json!(engine.status())),
            "rebuildIndex" => {
                let status = engine.rebuild().await?.status();
                Ok(json!({ "ready": status.ready, "count": status.count }))
            }
            "getSettings" => Ok(json!(engine.settings())),
            "setSettings" => {
                let settings = merge_settings(engine.settings(), params)?;
                let rebuilt = engine.reconfigure(settings).await?;
                Ok(json!({ "rebuilt": rebuilt }))
            }
            "addRecentSearch" => {
                let params: RecentSearchParams = parse_params(params)?;
                let recent = engine.add_recent_search(&params.query)?;
                Ok(json!(recent))
            }
            "getRecentSearches" => {
                let recent = engine.recent_searches()?;
                Ok(json!(recent))
            }
            "clearRecentSearches" => {
                engine.clear_recent_searches()?;
                Ok(json!([]))
            }
            method => Err(RpcError::method_not_found(method)),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

/// Overlays the given settings fields on `current`. Fields left out keep
/// their current value.
fn merge_settings(current: Settings, changes: Value) -> Result<Settings, RpcError> {
    let Value::Object(changes) = changes else {
        return Err(RpcError::invalid_params("expected an object of settings fields"));
    };
    let mut merged = serde_json::to_value(current).map_err(RpcError::internal)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(changes);
    }
    parse_params(merged)
}
