//! Public session tag names and the wire fields they map to.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::SessionDataEvent;
use crate::schema::EntityKind;

/// A `{key, value}` pair supplied by the host, keyed by public tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTag {
    pub key: String,
    pub value: String,
}

impl SessionTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where a public tag lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTarget {
    pub public_name: &'static str,
    pub wire_key: &'static str,
    pub entity: EntityKind,
}

const fn target(public_name: &'static str, wire_key: &'static str, entity: EntityKind) -> TagTarget {
    TagTarget {
        public_name,
        wire_key,
        entity,
    }
}

pub const SESSION_TAGS: &[TagTarget] = &[
    target("internal_view_session_id", "ilvesnid", EntityKind::CustomerView),
    target("internal_video_experiments", "ilvdes", EntityKind::CustomerView),
    target("view_session_id", "vesnid", EntityKind::CustomerView),
    target("video_experiments", "vdes", EntityKind::CustomerVideo),
    target("video_id", "vdid", EntityKind::CustomerVideo),
    target("video_title", "vdtt", EntityKind::CustomerVideo),
    target("video_cdn", "cn", EntityKind::CustomerVideo),
    target("video_content_type", "vdctty", EntityKind::CustomerVideo),
    target("video_duration", "vddu", EntityKind::CustomerVideo),
    target("video_encoding_variant", "vdeova", EntityKind::CustomerVideo),
    target("video_is_live", "vdisli", EntityKind::CustomerVideo),
    target("video_language_code", "vdlncd", EntityKind::CustomerVideo),
    target("video_producer", "vdpd", EntityKind::CustomerVideo),
    target("video_series", "vdsr", EntityKind::CustomerVideo),
    target("video_stream_type", "vdsmty", EntityKind::CustomerVideo),
    target("video_variant_id", "vdvaid", EntityKind::CustomerVideo),
    target("video_variant_name", "vdvana", EntityKind::CustomerVideo),
    target("video_source_url", "vdsour", EntityKind::CustomerVideo),
    target("viewer_user_id", "viusid", EntityKind::CustomerPlayer),
    target("experiment_name", "exna", EntityKind::CustomerPlayer),
    target("custom_1", "cm1", EntityKind::Custom),
    target("custom_2", "cm2", EntityKind::Custom),
    target("custom_3", "cm3", EntityKind::Custom),
    target("custom_4", "cm4", EntityKind::Custom),
    target("custom_5", "cm5", EntityKind::Custom),
];

pub fn lookup(public_name: &str) -> Option<&'static TagTarget> {
    SESSION_TAGS.iter().find(|t| t.public_name == public_name)
}

/// Routes tags into per-entity bags. Unknown names are logged and skipped.
pub fn route(tags: &[SessionTag]) -> SessionDataEvent {
    let mut event = SessionDataEvent::default();
    for tag in tags {
        let Some(target) = lookup(&tag.key) else {
            warn!(tag = %tag.key, "Ignoring unknown session tag");
            continue;
        };
        if let Some(bag) = event.bag_for(target.entity) {
            bag.insert_scalar(target.wire_key, tag.value.as_str());
        }
    }
    event
}
