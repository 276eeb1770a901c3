use playback_model::bag::scalar_text;
use playback_model::schema::structured_kind;
use playback_model::{AttributeBag, EntityKind, PlaybackEventKind, Synced, TrackableEvent, keys};

/// Keys sent with every event, changed or not.
pub const ALWAYS_SENT: &[&str] = &[
    keys::WORKSPACE_ID,
    keys::VIEW_ID,
    keys::VIEW_SEQUENCE_NUMBER,
    keys::PLAYER_SEQUENCE_NUMBER,
    keys::PLAYER_PLAYHEAD_TIME,
    keys::PLAYER_INSTANCE_ID,
    keys::VIEWER_TIME,
    keys::API_VERSION,
    keys::VIDEO_ID,
];

/// Strips scalar fields that have not changed since the last event sent.
#[derive(Debug)]
pub struct DeltaEncoder {
    snapshot: Option<AttributeBag>,
    last_event_at: Option<i64>,
    staleness_ms: i64,
}

impl DeltaEncoder {
    pub fn new(staleness_ms: u64) -> Self {
        Self {
            snapshot: None,
            last_event_at: None,
            staleness_ms: i64::try_from(staleness_ms).unwrap_or(i64::MAX),
        }
    }

    fn always_sent(key: &str) -> bool {
        ALWAYS_SENT.contains(&key)
            || key.eq_ignore_ascii_case(keys::EVENT_NAME)
            || key.starts_with("rq")
            || key.starts_with('d')
    }

    /// Rewrites the event's query in place.
    pub fn encode(&mut self, event: &mut TrackableEvent, now: i64) {
        let event_type = event.event_type();
        let view_begin = event_type == PlaybackEventKind::ViewBegin.as_ref();
        let view_completed = event_type == PlaybackEventKind::ViewCompleted.as_ref();
        let fresh = self
            .last_event_at
            .is_some_and(|at| now - at < self.staleness_ms);
        self.last_event_at = Some(now);

        match self.snapshot.as_mut() {
            Some(snapshot) if fresh && !view_begin && !view_completed => {
                let mut delta = event.query.clone();
                delta.retain(|key, value| {
                    structured_kind(key).is_some()
                        || Self::always_sent(key)
                        || snapshot
                            .get(key)
                            .is_none_or(|previous| scalar_text(previous) != scalar_text(value))
                });
                for (key, value) in delta.iter() {
                    if structured_kind(key).is_none() {
                        snapshot.insert_scalar(key, value.clone());
                    }
                }
                event.replace_bag(delta);
            }
            _ => {
                self.snapshot = if view_completed {
                    None
                } else {
                    let mut full = AttributeBag::new(EntityKind::Query);
                    full.update(&event.query);
                    Some(full)
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, pairs: &[(&str, &str)]) -> TrackableEvent {
        let mut event = TrackableEvent::new(event_type);
        for (key, value) in pairs {
            event.query.put(*key, *value).unwrap();
        }
        event
    }

    fn keys_of(event: &TrackableEvent) -> Vec<&str> {
        event.query.keys().collect()
    }

    const FIELDS: &[(&str, &str)] = &[
        ("veid", "view-1"),
        ("plna", "exoplayer"),
        ("vdsowt", "1280"),
        ("vitp", "1000"),
        ("viosfy", "Android"),
    ];

    #[test]
    fn repeated_bag_shrinks_to_always_sent_keys() {
        let mut encoder = DeltaEncoder::new(600_000);
        let mut first = event("playing", FIELDS);
        encoder.encode(&mut first, 1_000);
        assert_eq!(first.query.len(), FIELDS.len() + 1);

        let mut second = event("playing", FIELDS);
        encoder.encode(&mut second, 2_000);
        assert_eq!(keys_of(&second), ["evna", "veid", "vitp"]);
    }

    #[test]
    fn changed_and_prefixed_fields_are_kept() {
        let mut encoder = DeltaEncoder::new(600_000);
        encoder.encode(&mut event("playing", FIELDS), 1_000);

        let mut next = event(
            "pause",
            &[
                ("veid", "view-1"),
                ("plna", "exoplayer"),
                ("vdsowt", "1280"),
                ("viosfy", "iOS"),
                ("rqhn", "cdn"),
                ("demo", "pixel"),
            ],
        );
        encoder.encode(&mut next, 2_000);
        assert_eq!(
            keys_of(&next),
            ["evna", "veid", "viosfy", "rqhn", "demo"]
        );
        assert_eq!(next.event_type(), "pause");
    }

    #[test]
    fn view_boundaries_and_staleness_send_full_events() {
        let mut encoder = DeltaEncoder::new(600_000);
        encoder.encode(&mut event("playing", FIELDS), 1_000);

        let mut begin = event("viewBegin", FIELDS);
        encoder.encode(&mut begin, 2_000);
        assert_eq!(begin.query.len(), FIELDS.len() + 1);

        let mut stale = event("pause", FIELDS);
        encoder.encode(&mut stale, 2_000 + 600_000);
        assert_eq!(stale.query.len(), FIELDS.len() + 1);

        let mut completed = event("viewCompleted", FIELDS);
        encoder.encode(&mut completed, 2_000 + 600_001);
        let mut after = event("pause", FIELDS);
        encoder.encode(&mut after, 2_000 + 600_002);
        assert_eq!(after.query.len(), FIELDS.len() + 1);
    }

    #[test]
    fn structured_fields_always_travel() {
        let mut encoder = DeltaEncoder::new(600_000);
        let headers = serde_json::json!({"x-cache": "HIT"});
        let mut first = TrackableEvent::new("requestCompleted");
        first.query.put("rqrphs", headers.clone()).unwrap();
        encoder.encode(&mut first, 1);

        let mut second = TrackableEvent::new("requestCompleted");
        second.query.put("rqrphs", headers).unwrap();
        encoder.encode(&mut second, 2);
        assert!(second.query.contains_key("rqrphs"));
    }
}
