//! Remote object data service seam
//!
//! Everything that talks to the server goes through [`RemoteDataService`], so
//! the query client and host adapter can be exercised against a fake.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shared::RecordId;

use crate::error::SelectionResult;

/// Search/read/call access to the server's object model
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Search records matching `domain` and read `fields` from them
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>>;

    /// Invoke a named model method with positional and keyword arguments
    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SelectionResult<Value>;

    /// Read `fields` from the records with the given ids
    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>>;
}

#[async_trait]
impl<T: RemoteDataService + ?Sized> RemoteDataService for Arc<T> {
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>> {
        (**self).search_read(model, domain, fields).await
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SelectionResult<Value> {
        (**self).call(model, method, args, kwargs).await
    }

    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>> {
        (**self).read(model, ids, fields).await
    }
}
