//! Static data asset identity.
//!
//! Each static loader result is addressed twice: by an id derived from the
//! route, role and pathname that produced it, and by the hash of its
//! serialized content. Clients look up `id hash -> content hash` and fetch
//! `_immutable/data/{content hash}.json`, so identical payloads share a file.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::routing::RouteKind;
use crate::utils::hash::fingerprint;

/// Directory holding static data files inside the client output.
pub const STATIC_DATA_DIR: &str = "_immutable/data";

/// `{route id}~{kind}~{pathname}`.
pub fn static_data_asset_id(route_id: &str, kind: RouteKind, pathname: &str) -> String {
    format!("{route_id}~{kind}~{pathname}")
}

/// Hashed form of an asset id, as used in client tables.
pub fn hash_asset_id(asset_id: &str) -> String {
    fingerprint(asset_id)
}

/// Output path of a data file for `content_hash`.
pub fn static_data_filename(content_hash: &str) -> String {
    format!("{STATIC_DATA_DIR}/{content_hash}.json")
}

/// Produces a static data payload without running the route's loader.
pub type StaticDataLoader = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Precomputed static data available to the server.
#[derive(Clone, Default)]
pub struct StaticDataManifest {
    /// Id hash to content hash, shipped to the client.
    pub client_hash_record: BTreeMap<String, String>,
    /// Plain asset id to id hash.
    pub server_hash_record: BTreeMap<String, String>,
    /// Id hash to loader.
    pub loaders: BTreeMap<String, StaticDataLoader>,
}

impl StaticDataManifest {
    /// Register a payload already known for `asset_id`.
    pub fn insert(&mut self, asset_id: &str, content_hash: &str, data: Value) {
        let id_hash = hash_asset_id(asset_id);
        self.client_hash_record
            .insert(id_hash.clone(), content_hash.to_string());
        self.server_hash_record
            .insert(asset_id.to_string(), id_hash.clone());
        let data = Arc::new(data);
        self.loaders.insert(
            id_hash,
            Arc::new(move || {
                let data = data.clone();
                Box::pin(async move { Ok((*data).clone()) })
            }),
        );
    }

    /// Loader for a plain asset id, if the payload is precomputed.
    pub fn loader(&self, asset_id: &str) -> Option<&StaticDataLoader> {
        self.server_hash_record
            .get(asset_id)
            .and_then(|id_hash| self.loaders.get(id_hash))
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl fmt::Debug for StaticDataManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticDataManifest")
            .field("client_hash_record", &self.client_hash_record)
            .field("server_hash_record", &self.server_hash_record)
            .field("loaders", &self.loaders.len())
            .finish()
    }
}
