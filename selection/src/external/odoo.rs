//! Odoo JSON-RPC client
//!
//! Talks to the `/jsonrpc` endpoint using `execute_kw` on the `object`
//! service. Server faults whose exception is an `AttributeError` (the model has
//! no such method) are reported as [`SelectionError::NotImplemented`] so the
//! query client can fall back to a plain `search_read`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::RecordId;

use super::remote::RemoteDataService;
use crate::config::OdooConfig;
use crate::error::{SelectionError, SelectionResult};

/// JSON-RPC client for an Odoo server
pub struct OdooRpcClient {
    client: Client,
    base_url: String,
    database: String,
    uid: i64,
    password: String,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcFaultData>,
}

#[derive(Debug, Deserialize)]
struct RpcFaultData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

impl RpcFault {
    /// Convert a server fault raised while calling `target` into a selection error.
    ///
    /// Only faults that say `target` itself is missing, or does not accept the
    /// keyword arguments sent, count as not implemented. Errors raised inside an
    /// existing method stay RPC errors.
    fn into_error(self, target: &str) -> SelectionError {
        let (name, detail) = match self.data {
            Some(data) => (data.name, data.message),
            None => (String::new(), String::new()),
        };

        let names_target = detail.contains(&format!("'{}'", target))
            || detail.contains(&format!("{}()", target));
        let missing = name.ends_with("NotImplementedError")
            || (name.ends_with("AttributeError") && detail.contains("has no attribute") && names_target)
            || (name.ends_with("TypeError")
                && detail.contains("unexpected keyword argument")
                && names_target);
        if missing {
            return SelectionError::NotImplemented(target.to_string());
        }

        let message = if detail.is_empty() { self.message } else { detail };
        SelectionError::Rpc {
            code: self.code,
            message,
        }
    }
}

impl OdooRpcClient {
    /// Build a client for an already known user id
    pub fn new(config: &OdooConfig, uid: i64) -> SelectionResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            uid,
            password: config.password.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Build a client, logging in first when the config carries no user id
    pub async fn connect(config: &OdooConfig) -> SelectionResult<Self> {
        let mut client = Self::new(config, config.uid.unwrap_or_default())?;
        if config.uid.is_none() {
            client.uid = client.authenticate(&config.login).await?;
        }
        Ok(client)
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    async fn authenticate(&self, login: &str) -> SelectionResult<i64> {
        let result = self
            .rpc(
                "common",
                "login",
                json!([self.database, login, self.password]),
                "login",
            )
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => {
                tracing::debug!(uid, database = %self.database, "Authenticated");
                Ok(uid)
            }
            _ => Err(SelectionError::Authentication(login.to_string())),
        }
    }

    /// One JSON-RPC call; `target` is the name faults are matched against
    async fn rpc(
        &self,
        service: &str,
        method: &str,
        args: Value,
        target: &str,
    ) -> SelectionResult<Value> {
        let url = format!("{}/jsonrpc", self.base_url);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SelectionError::NotImplemented(target.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SelectionError::Query(format!("{} - {}", status, body)));
        }

        let body: RpcResponse = response.json().await?;
        match (body.result, body.error) {
            (_, Some(fault)) => Err(fault.into_error(target)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    /// `execute_kw` on the object service
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SelectionResult<Value> {
        let args = json!([
            self.database,
            self.uid,
            self.password,
            model,
            method,
            args,
            kwargs
        ]);

        self.rpc("object", "execute_kw", args, method)
            .await
            .map_err(|err| match err {
                SelectionError::NotImplemented(_) => {
                    tracing::warn!(model, method, "Remote method not available");
                    SelectionError::NotImplemented(format!("{}.{}", model, method))
                }
                other => other,
            })
    }
}

fn into_records(value: Value) -> SelectionResult<Vec<Value>> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Bool(false) | Value::Null => Ok(Vec::new()),
        other => Err(SelectionError::Query(format!(
            "expected a record list, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RemoteDataService for OdooRpcClient {
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>> {
        let result = self
            .execute_kw(model, "search_read", json!([domain]), json!({ "fields": fields }))
            .await?;
        into_records(result)
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SelectionResult<Value> {
        self.execute_kw(model, method, args, kwargs).await
    }

    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let result = self
            .execute_kw(model, "read", json!([ids]), json!({ "fields": fields }))
            .await?;
        into_records(result)
    }
}
