//! Hot module replacement events.
//!
//! The dev server queues events as route files change; the client polls
//! `GET /:virtual/vessel/hmr` to drain them and acknowledges route changes
//! with `POST /:virtual/vessel/hmr`.
//!
//! Wire format:
//!
//! ```json
//! {"event": "vessel::route_change", "data": {"id": "/blog/[slug]"}}
//! {"event": "vessel::md_meta", "data": {"filePath": "blog/page.md", "type": "page", "meta": {"title": "Blog"}}}
//! ```

use std::mem;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::RouteKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum HmrEvent {
    /// Front matter of a Markdown route file changed.
    #[serde(rename = "vessel::md_meta")]
    MdMeta {
        #[serde(rename = "filePath")]
        file_path: String,
        #[serde(rename = "type")]
        kind: RouteKind,
        meta: Value,
    },

    /// A route gained or lost a slot.
    #[serde(rename = "vessel::route_change")]
    RouteChange { id: String },
}

/// Events waiting for the client.
#[derive(Debug, Default)]
pub struct HmrQueue {
    events: Mutex<Vec<HmrEvent>>,
}

impl HmrQueue {
    pub fn push(&self, event: HmrEvent) {
        let mut events = self.events.lock();
        // One pending change per route is enough.
        if !events.contains(&event) {
            events.push(event);
        }
    }

    pub fn drain(&self) -> Vec<HmrEvent> {
        mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
