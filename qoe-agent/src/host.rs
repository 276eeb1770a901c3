//! What the embedding application tells the agent about the device and the
//! player it wraps.

use parking_lot::Mutex;
use playback_model::{AttributeBag, EntityKind, keys};
use serde::{Deserialize, Serialize};

/// Static description of the device and host application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDescriptor {
    pub device_id: Option<String>,
    pub os_family: Option<String>,
    pub os_version: Option<String>,
    pub os_architecture: Option<String>,
    pub device_name: Option<String>,
    pub device_category: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub connection_type: Option<String>,
    pub plugin_name: Option<String>,
    pub plugin_version: Option<String>,
    pub player_software: Option<String>,
    pub player_version: Option<String>,
}

impl DeviceDescriptor {
    pub fn viewer_bag(&self) -> AttributeBag {
        let mut bag = AttributeBag::new(EntityKind::Viewer);
        let fields = [
            (keys::OS_FAMILY, &self.os_family),
            (keys::OS_ARCHITECTURE, &self.os_architecture),
            (keys::OS_VERSION, &self.os_version),
            (keys::DEVICE_MANUFACTURER, &self.manufacturer),
            (keys::DEVICE_MODEL, &self.model),
            (keys::DEVICE_NAME, &self.device_name),
            (keys::DEVICE_CATEGORY, &self.device_category),
            (keys::CONNECTION_TYPE, &self.connection_type),
            (keys::BROWSER, &self.app_name),
            (keys::BROWSER_VERSION, &self.app_version),
        ];
        for (key, value) in fields {
            if let Some(value) = value.as_deref() {
                bag.insert_scalar(key, value);
            }
        }
        bag
    }

    /// Player software fields every player bag carries.
    pub fn player_bag(&self) -> AttributeBag {
        let mut bag = AttributeBag::new(EntityKind::Player);
        let fields = [
            ("plfpsdna", &self.plugin_name),
            ("plfpsdvn", &self.plugin_version),
            (keys::PLAYER_SOFTWARE_NAME, &self.player_software),
            (keys::PLAYER_SOFTWARE_VERSION, &self.player_version),
        ];
        for (key, value) in fields {
            if let Some(value) = value.as_deref() {
                bag.insert_scalar(key, value);
            }
        }
        bag
    }
}

/// Properties of the media source currently loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSource {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<i64>,
    pub advertised_bitrate: Option<i64>,
    pub advertised_frame_rate: Option<f64>,
    pub duration_ms: Option<i64>,
    pub codec: Option<String>,
    pub mime_type: Option<String>,
    pub hostname: Option<String>,
    pub holdback_ms: Option<i64>,
    pub part_holdback_ms: Option<i64>,
    pub part_target_duration_ms: Option<i64>,
    pub target_duration_ms: Option<i64>,
}

impl VideoSource {
    /// Video bag describing this source. Unknown properties are left out.
    pub fn to_bag(&self) -> AttributeBag {
        let mut bag = AttributeBag::new(EntityKind::Video);
        let integers = [
            (keys::VIDEO_SOURCE_WIDTH, self.width),
            (keys::VIDEO_SOURCE_HEIGHT, self.height),
            (keys::VIDEO_SOURCE_FPS, self.fps),
            (keys::VIDEO_SOURCE_BITRATE, self.advertised_bitrate),
            (keys::VIDEO_SOURCE_DURATION, self.duration_ms),
            (keys::VIDEO_HOLDBACK, self.holdback_ms),
            (keys::VIDEO_PART_HOLDBACK, self.part_holdback_ms),
            (keys::VIDEO_PART_TARGET_DURATION, self.part_target_duration_ms),
            (keys::VIDEO_TARGET_DURATION, self.target_duration_ms),
        ];
        for (key, value) in integers {
            if let Some(value) = value {
                bag.insert_scalar(key, value);
            }
        }
        if let Some(rate) = self.advertised_frame_rate {
            bag.insert_scalar(keys::VIDEO_SOURCE_ADVERTISED_FRAME_RATE, rate);
        }
        let texts = [
            (keys::VIDEO_SOURCE_CODEC, &self.codec),
            (keys::VIDEO_SOURCE_MIME_TYPE, &self.mime_type),
            (keys::VIDEO_SOURCE_HOSTNAME, &self.hostname),
        ];
        for (key, value) in texts {
            if let Some(value) = value.as_deref() {
                bag.insert_scalar(key, value);
            }
        }
        bag
    }
}

/// A point-in-time reading of the host player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSnapshot {
    pub position_ms: i64,
    pub is_paused: bool,
    pub is_autoplay: bool,
    pub is_buffering: bool,
    pub view_width: i64,
    pub view_height: i64,
    pub program_time_ms: Option<i64>,
    pub manifest_newest_time_ms: Option<i64>,
    pub source: VideoSource,
}

/// Polled by the tracker once per event and on every sampling tick.
pub trait PlayerStateProvider: Send + Sync {
    fn snapshot(&self) -> PlayerSnapshot;
}

/// Provider backed by a snapshot the host overwrites as state changes.
#[derive(Debug, Default)]
pub struct SharedPlayerState {
    inner: Mutex<PlayerSnapshot>,
}

impl SharedPlayerState {
    pub fn new(initial: PlayerSnapshot) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut PlayerSnapshot)) {
        f(&mut *self.inner.lock());
    }
}

impl PlayerStateProvider for SharedPlayerState {
    fn snapshot(&self) -> PlayerSnapshot {
        self.inner.lock().clone()
    }
}
