//! Payload handles carried through the dispatcher
//!
//! `Tags` is moved into each dispatch and borrowed by every consumer.
//! `Arc<Tags>` lets consumers that keep or forward a record clone it cheaply.

use std::sync::Arc;

use crate::tags::Tags;

/// Record handle a [`Logger`](crate::Logger) publishes
pub trait Payload: Clone + Send + Sync + 'static {
    fn from_tags(tags: Tags) -> Self;

    fn tags(&self) -> &Tags;
}

impl Payload for Tags {
    fn from_tags(tags: Tags) -> Self {
        tags
    }

    fn tags(&self) -> &Tags {
        self
    }
}

impl Payload for Arc<Tags> {
    fn from_tags(tags: Tags) -> Self {
        Arc::new(tags)
    }

    fn tags(&self) -> &Tags {
        self
    }
}
