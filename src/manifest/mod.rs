//! Manifests derived from the route table.
//!
//! Both are snapshots: once built they no longer follow the live table.

mod client;
mod server;
mod static_data;

pub use client::{ClientManifest, ClientRoute};
pub use server::{DocumentManifest, ServerHttpRoute, ServerManifest};
pub use static_data::{
    STATIC_DATA_DIR, StaticDataLoader, StaticDataManifest, hash_asset_id, static_data_asset_id,
    static_data_filename,
};
