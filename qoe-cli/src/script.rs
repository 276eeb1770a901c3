//! JSON scripts describing a player session.
//!
//! ```json
//! {
//!   "player": "main",
//!   "customer": { "player": { "wsid": "ws-1" }, "video": { "vdid": "v-1" } },
//!   "state": { "source": { "width": 1920, "height": 1080 } },
//!   "steps": [
//!     { "event": "play" },
//!     { "state": { "is_paused": false } },
//!     { "event": "playing" },
//!     { "wait": 5000 },
//!     { "event": "pause" }
//!   ]
//! }
//! ```

use playback_model::entities::{Orientation, RequestSample};
use playback_model::{AttributeBag, PlaybackEventKind, SessionTag};
use qoe_agent::host::{DeviceDescriptor, PlayerSnapshot};
use qoe_agent::{CustomerData, PlayerOptions, Presentation};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

fn default_player() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default = "default_player")]
    pub player: String,
    #[serde(default)]
    pub device: DeviceDescriptor,
    #[serde(default)]
    pub options: PlayerOptions,
    #[serde(default)]
    pub customer: CustomerSection,
    /// Initial host player state.
    #[serde(default)]
    pub state: PlayerSnapshot,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(raw)?;
        if script.player.trim().is_empty() {
            return Err(AppError::InvalidInput("player name must not be empty".into()));
        }
        Ok(script)
    }
}

/// Customer bags keyed by wire field name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerSection {
    pub player: Map<String, Value>,
    pub video: Map<String, Value>,
    pub view: Map<String, Value>,
    pub viewer: Map<String, Value>,
    pub custom: Map<String, Value>,
}

impl CustomerSection {
    pub fn to_customer_data(&self) -> Result<CustomerData> {
        let mut data = CustomerData::new();
        fill(&mut data.player, &self.player)?;
        fill(&mut data.video, &self.video)?;
        fill(&mut data.view, &self.view)?;
        fill(&mut data.viewer, &self.viewer)?;
        fill(&mut data.custom, &self.custom)?;
        Ok(data)
    }
}

fn fill(bag: &mut AttributeBag, fields: &Map<String, Value>) -> Result<()> {
    for (key, value) in fields {
        bag.put(key.as_str(), value.clone())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorStep {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStep {
    pub kind: PlaybackEventKind,
    #[serde(default)]
    pub sample: RequestSample,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Playback lifecycle event.
    Event(PlaybackEventKind),
    /// Network request observed by the player.
    Request(RequestStep),
    /// Partial update of the host player state.
    State(Map<String, Value>),
    /// Lets time pass. The playhead moves while playing.
    Wait(u64),
    Error(ErrorStep),
    VideoChange(CustomerSection),
    ProgramChange(CustomerSection),
    UpdateCustomerData(CustomerSection),
    SessionTags(Vec<SessionTag>),
    PlayerSize(Size),
    ScreenSize(Size),
    Presentation(Presentation),
    Orientation(Orientation),
    DroppedFrames(i64),
    AutomaticErrorTracking(bool),
    Flush,
}

/// Applies a partial JSON update to a snapshot.
pub fn patch_snapshot(snapshot: &PlayerSnapshot, patch: &Map<String, Value>) -> Result<PlayerSnapshot> {
    let mut merged = serde_json::to_value(snapshot)?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in patch {
            match (fields.get_mut(key), value) {
                (Some(Value::Object(current)), Value::Object(update)) => {
                    for (k, v) in update {
                        current.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Ok(serde_json::from_value(merged)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_model::keys;

    #[test]
    fn parses_every_step_shape() {
        let script = Script::from_json_str(
            r#"{
                "customer": { "player": { "wsid": "ws-1" } },
                "steps": [
                    { "event": "play" },
                    { "request": { "kind": "requestCompleted", "sample": { "bytes_loaded": 1000 } } },
                    { "state": { "position_ms": 500 } },
                    { "wait": 250 },
                    { "error": { "code": 3, "message": "decode" } },
                    { "video_change": { "video": { "vdid": "v-2" } } },
                    { "session_tags": [ { "key": "video_id", "value": "v-3" } ] },
                    { "player_size": { "width": 640, "height": 360 } },
                    { "presentation": "fullscreen" },
                    { "orientation": "portrait" },
                    { "dropped_frames": 4 },
                    "flush"
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.player, "main");
        assert_eq!(script.steps.len(), 12);
        assert!(matches!(script.steps[0], Step::Event(PlaybackEventKind::Play)));
        assert!(matches!(script.steps[11], Step::Flush));

        let customer = script.customer.to_customer_data().unwrap();
        assert_eq!(
            customer.player.get(keys::WORKSPACE_ID),
            Some(&Value::from("ws-1"))
        );
    }

    #[test]
    fn empty_player_name_is_rejected() {
        assert!(Script::from_json_str(r#"{ "player": " ", "steps": [] }"#).is_err());
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let mut snapshot = PlayerSnapshot {
            position_ms: 1000,
            is_paused: true,
            ..PlayerSnapshot::default()
        };
        snapshot.source.width = Some(1280);

        let patch: Map<String, Value> = serde_json::from_str(
            r#"{ "is_paused": false, "source": { "height": 720 } }"#,
        )
        .unwrap();
        let patched = patch_snapshot(&snapshot, &patch).unwrap();

        assert_eq!(patched.position_ms, 1000);
        assert!(!patched.is_paused);
        assert_eq!(patched.source.width, Some(1280));
        assert_eq!(patched.source.height, Some(720));
    }
}
