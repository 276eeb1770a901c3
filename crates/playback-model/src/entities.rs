//! Typed accessors over [`AttributeBag`] for the fields the agent reads back,
//! plus the small value types hosts hand in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString};

use crate::bag::AttributeBag;
use crate::error::FormatError;
use crate::schema::{EntityKind, keys};

pub trait PlayerFields {
    fn playhead_time(&self) -> Option<i64>;
    fn is_paused(&self) -> Option<bool>;
    fn player_width(&self) -> Option<i64>;
    fn player_height(&self) -> Option<i64>;
}

impl PlayerFields for AttributeBag {
    fn playhead_time(&self) -> Option<i64> {
        self.get_i64(keys::PLAYER_PLAYHEAD_TIME)
    }

    fn is_paused(&self) -> Option<bool> {
        self.get_bool(keys::PLAYER_IS_PAUSED)
    }

    fn player_width(&self) -> Option<i64> {
        self.get_i64(keys::PLAYER_WIDTH)
    }

    fn player_height(&self) -> Option<i64> {
        self.get_i64(keys::PLAYER_HEIGHT)
    }
}

pub trait ViewFields {
    fn view_id(&self) -> Option<String>;
    fn sequence_number(&self) -> Option<i64>;
    fn viewer_time(&self) -> Option<i64>;
    fn watch_time(&self) -> Option<i64>;
    fn program_changed(&self) -> bool;
    fn min_request_throughput(&self) -> Option<i64>;
    fn max_request_latency(&self) -> Option<f64>;
}

impl ViewFields for AttributeBag {
    fn view_id(&self) -> Option<String> {
        self.get_string(keys::VIEW_ID)
    }

    fn sequence_number(&self) -> Option<i64> {
        self.get_i64(keys::VIEW_SEQUENCE_NUMBER)
    }

    fn viewer_time(&self) -> Option<i64> {
        self.get_i64(keys::VIEWER_TIME)
    }

    fn watch_time(&self) -> Option<i64> {
        self.get_i64(keys::VIEW_WATCH_TIME)
    }

    fn program_changed(&self) -> bool {
        self.get_bool(keys::VIEW_PROGRAM_CHANGED).unwrap_or(false)
    }

    fn min_request_throughput(&self) -> Option<i64> {
        self.get_i64(keys::VIEW_MIN_REQUEST_THROUGHPUT)
    }

    fn max_request_latency(&self) -> Option<f64> {
        self.get_f64(keys::VIEW_MAX_REQUEST_LATENCY)
    }
}

pub trait VideoFields {
    fn source_width(&self) -> Option<i64>;
    fn source_height(&self) -> Option<i64>;
}

impl VideoFields for AttributeBag {
    fn source_width(&self) -> Option<i64> {
        self.get_i64(keys::VIDEO_SOURCE_WIDTH)
    }

    fn source_height(&self) -> Option<i64> {
        self.get_i64(keys::VIDEO_SOURCE_HEIGHT)
    }
}

pub trait BandwidthFields {
    fn request_start(&self) -> Option<i64>;
    fn response_start(&self) -> Option<i64>;
    fn response_end(&self) -> Option<i64>;
    fn bytes_loaded(&self) -> Option<i64>;
}

impl BandwidthFields for AttributeBag {
    fn request_start(&self) -> Option<i64> {
        self.get_i64(keys::REQUEST_START)
    }

    fn response_start(&self) -> Option<i64> {
        self.get_i64(keys::REQUEST_RESPONSE_START)
    }

    fn response_end(&self) -> Option<i64> {
        self.get_i64(keys::REQUEST_RESPONSE_END)
    }

    fn bytes_loaded(&self) -> Option<i64> {
        self.get_i64(keys::REQUEST_BYTES_LOADED)
    }
}

/// One network request observed by the host player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSample {
    pub request_start: Option<i64>,
    pub response_start: Option<i64>,
    pub response_end: Option<i64>,
    pub bytes_loaded: Option<i64>,
    pub request_type: Option<String>,
    pub hostname: Option<String>,
    pub url: Option<String>,
    pub media_duration: Option<f64>,
    pub current_level: Option<i64>,
    pub media_start_time: Option<i64>,
    pub video_width: Option<i64>,
    pub video_height: Option<i64>,
    pub labeled_bitrate: Option<i64>,
    pub error: Option<String>,
    pub error_text: Option<String>,
    pub error_code: Option<i64>,
    pub request_id: Option<String>,
    pub cancel: Option<String>,
    pub response_headers: Option<Map<String, Value>>,
    pub rendition_list: Option<Map<String, Value>>,
    pub media: Option<Vec<Value>>,
}

impl RequestSample {
    /// Builds the bandwidth bag for a `request*` playback event.
    pub fn to_bag(&self, event_type: &str) -> Result<AttributeBag, FormatError> {
        let mut bag = AttributeBag::new(EntityKind::Bandwidth);
        bag.put(keys::REQUEST_EVENT_TYPE, event_type)?;
        bag.put(keys::REQUEST_START, self.request_start)?;
        bag.put(keys::REQUEST_RESPONSE_START, self.response_start)?;
        bag.put(keys::REQUEST_RESPONSE_END, self.response_end)?;
        bag.put(keys::REQUEST_BYTES_LOADED, self.bytes_loaded)?;
        bag.put(keys::REQUEST_TYPE, self.request_type.clone())?;
        bag.put(keys::REQUEST_HOSTNAME, self.hostname.clone())?;
        bag.put(keys::REQUEST_URL, self.url.clone())?;
        if let Some(duration) = self.media_duration {
            bag.put_f64(keys::REQUEST_MEDIA_DURATION, duration)?;
        }
        bag.put(keys::REQUEST_CURRENT_LEVEL, self.current_level)?;
        bag.put(keys::REQUEST_MEDIA_START_TIME, self.media_start_time)?;
        bag.put(keys::REQUEST_VIDEO_WIDTH, self.video_width)?;
        bag.put(keys::REQUEST_VIDEO_HEIGHT, self.video_height)?;
        bag.put(keys::REQUEST_LABELED_BITRATE, self.labeled_bitrate)?;
        bag.put(keys::REQUEST_ERROR, self.error.clone())?;
        bag.put(keys::REQUEST_ERROR_TEXT, self.error_text.clone())?;
        bag.put(keys::REQUEST_ERROR_CODE, self.error_code)?;
        bag.put(keys::REQUEST_ID, self.request_id.clone())?;
        bag.put(keys::REQUEST_CANCEL, self.cancel.clone())?;
        if let Some(headers) = &self.response_headers {
            bag.put(keys::REQUEST_RESPONSE_HEADERS, Value::Object(headers.clone()))?;
        }
        if let Some(renditions) = &self.rendition_list {
            bag.put(keys::REQUEST_RENDITION_LIST, Value::Object(renditions.clone()))?;
        }
        if let Some(media) = &self.media {
            bag.put(keys::MEDIA, Value::Array(media.clone()))?;
        }

        if let (Some(start), Some(first_byte)) = (self.request_start, self.response_start) {
            bag.put(keys::REQUEST_LATENCY, first_byte - start)?;
        }
        if let (Some(first_byte), Some(end), Some(bytes)) =
            (self.response_start, self.response_end, self.bytes_loaded)
        {
            let load_time = end - first_byte;
            if load_time > 0 && bytes > 0 {
                bag.put(keys::REQUEST_THROUGHPUT, bytes * 8000 / load_time)?;
            }
        }
        Ok(bag)
    }
}

/// Screen orientation reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Rotation around the z axis in degrees.
    pub fn z_rotation(self) -> i64 {
        match self {
            Self::Portrait => 90,
            Self::Landscape => 0,
        }
    }

    pub fn to_bag(self) -> Result<AttributeBag, FormatError> {
        let mut bag = AttributeBag::new(EntityKind::Orientation);
        bag.put(keys::ORIENTATION_X, 0)?;
        bag.put(keys::ORIENTATION_Y, 0)?;
        bag.put(keys::ORIENTATION_Z, self.z_rotation())?;
        Ok(bag)
    }

    /// The `{x, y, z}` object carried under the view's orientation key.
    pub fn to_json(self) -> Value {
        json!({ "x": 0, "y": 0, "z": self.z_rotation() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sample_derives_latency_and_throughput() {
        let sample = RequestSample {
            request_start: Some(1_000),
            response_start: Some(1_040),
            response_end: Some(1_240),
            bytes_loaded: Some(50_000),
            request_type: Some("media".into()),
            ..Default::default()
        };
        let bag = sample.to_bag("requestCompleted").unwrap();
        assert_eq!(bag.get_i64(keys::REQUEST_LATENCY), Some(40));
        assert_eq!(bag.get_i64(keys::REQUEST_THROUGHPUT), Some(2_000_000));
        assert_eq!(bag.bytes_loaded(), Some(50_000));
        assert_eq!(
            bag.get_string(keys::REQUEST_EVENT_TYPE).as_deref(),
            Some("requestCompleted")
        );
        assert!(!bag.contains_key(keys::REQUEST_URL));
    }

    #[test]
    fn orientation_rotation() {
        assert_eq!(Orientation::Portrait.z_rotation(), 90);
        let bag = Orientation::Landscape.to_bag().unwrap();
        assert_eq!(bag.get_i64(keys::ORIENTATION_Z), Some(0));
        assert_eq!("PORTRAIT".parse::<Orientation>().unwrap(), Orientation::Portrait);
    }
}
