//! Wire schema: which short keys belong to which entity, and which keys carry
//! structured (object or array) values instead of scalars.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The kind of entity an [`AttributeBag`](crate::AttributeBag) describes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    CustomerPlayer,
    View,
    Video,
    CustomerVideo,
    CustomerView,
    CustomerViewer,
    Viewer,
    Environment,
    Bandwidth,
    Custom,
    Orientation,
    /// Merged payload of a trackable event; accepts every key.
    Query,
}

/// Shape required by a structured key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
    Object,
    Array,
}

impl StructuredKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Object => "an object",
            Self::Array => "an array",
        }
    }
}

/// Returns the structured shape of `key`, or `None` for scalar keys.
pub fn structured_kind(key: &str) -> Option<StructuredKind> {
    match key {
        keys::REQUEST_RESPONSE_HEADERS | keys::REQUEST_RENDITION_LIST => {
            Some(StructuredKind::Object)
        }
        keys::MEDIA => Some(StructuredKind::Array),
        _ => None,
    }
}

/// Short wire keys referenced by the agent.
pub mod keys {
    pub const EVENT_NAME: &str = "evna";
    pub const BEACON_DOMAIN: &str = "bedn";

    // view
    pub const VIEW_ID: &str = "veid";
    pub const VIEW_START: &str = "vest";
    pub const VIEW_SEQUENCE_NUMBER: &str = "vesqnu";
    pub const VIEWER_TIME: &str = "vitp";
    pub const VIEW_WATCH_TIME: &str = "vewati";
    pub const VIEW_REBUFFER_COUNT: &str = "verbco";
    pub const VIEW_REBUFFER_DURATION: &str = "verbdu";
    pub const VIEW_REBUFFER_FREQUENCY: &str = "verbfq";
    pub const VIEW_REBUFFER_PERCENTAGE: &str = "verbpg";
    pub const VIEW_SEEK_COUNT: &str = "veseco";
    pub const VIEW_SEEK_DURATION: &str = "vesedu";
    pub const VIEW_MAX_SEEK_TIME: &str = "vemaseti";
    pub const VIEW_MAX_UPSCALE_PERCENTAGE: &str = "vemauppg";
    pub const VIEW_MAX_DOWNSCALE_PERCENTAGE: &str = "vemadopg";
    pub const VIEW_TOTAL_CONTENT_PLAYBACK_TIME: &str = "vetlctpbti";
    pub const VIEW_TOTAL_UPSCALING: &str = "vetlug";
    pub const VIEW_TOTAL_DOWNSCALING: &str = "vetldg";
    pub const VIEW_CONTENT_PLAYBACK_TIME: &str = "vectpbti";
    pub const VIEW_MAX_PLAYHEAD_POSITION: &str = "vemaphps";
    pub const VIEW_TIME_TO_FIRST_FRAME: &str = "vetitofifr";
    pub const VIEW_REQUEST_COUNT: &str = "verqco";
    pub const VIEW_REQUEST_FAILED_COUNT: &str = "verqfaco";
    pub const VIEW_REQUEST_CANCELED_COUNT: &str = "verqclco";
    pub const VIEW_MIN_REQUEST_THROUGHPUT: &str = "vemnrqth";
    pub const VIEW_AVERAGE_REQUEST_THROUGHPUT: &str = "veavrqth";
    pub const VIEW_MAX_REQUEST_LATENCY: &str = "vemarqlt";
    pub const VIEW_AVERAGE_REQUEST_LATENCY: &str = "veavrqlt";
    pub const VIEW_DEVICE_ORIENTATION: &str = "vedeor";
    pub const VIEW_DROPPED_FRAME_COUNT: &str = "vedrfrco";
    pub const VIEW_PROGRAM_CHANGED: &str = "vepmch";

    // player
    pub const PLAYER_INSTANCE_ID: &str = "plinid";
    pub const PLAYER_SEQUENCE_NUMBER: &str = "plsqnu";
    pub const PLAYER_PLAYHEAD_TIME: &str = "plphti";
    pub const PLAYER_IS_PAUSED: &str = "plispu";
    pub const PLAYER_AUTOPLAY_ON: &str = "plauon";
    pub const PLAYER_PRELOAD_ON: &str = "plpron";
    pub const PLAYER_IS_FULLSCREEN: &str = "plisfl";
    pub const PLAYER_WIDTH: &str = "plwt";
    pub const PLAYER_HEIGHT: &str = "plht";
    pub const PLAYER_ERROR_CODE: &str = "plercd";
    pub const PLAYER_ERROR_MESSAGE: &str = "plerms";
    pub const PLAYER_ERROR_CONTEXT: &str = "plercx";
    pub const PLAYER_LANGUAGE_CODE: &str = "pllncd";
    pub const PLAYER_PROGRAM_TIME: &str = "plpmti";
    pub const PLAYER_MANIFEST_NEWEST_PROGRAM_TIME: &str = "plmfnepmti";
    pub const PLAYER_SOFTWARE_NAME: &str = "plswna";
    pub const PLAYER_SOFTWARE_VERSION: &str = "plswvn";

    // customer player
    pub const WORKSPACE_ID: &str = "wsid";
    pub const PLAYER_NAME: &str = "plna";
    pub const PLAYER_VERSION: &str = "plvn";
    pub const PLAYER_INIT_TIME: &str = "plitti";
    pub const VIEWER_USER_ID: &str = "viusid";
    pub const EXPERIMENT_NAME: &str = "exna";

    // video
    pub const VIDEO_ID: &str = "vdid";
    pub const VIDEO_SOURCE_WIDTH: &str = "vdsowt";
    pub const VIDEO_SOURCE_HEIGHT: &str = "vdsoht";
    pub const VIDEO_SOURCE_URL: &str = "vdsour";
    pub const VIDEO_SOURCE_HOSTNAME: &str = "vdsohn";
    pub const VIDEO_SOURCE_DOMAIN: &str = "vdsodn";
    pub const VIDEO_SOURCE_DURATION: &str = "vdsodu";
    pub const VIDEO_SOURCE_IS_LIVE: &str = "vdsoisli";
    pub const VIDEO_SOURCE_MIME_TYPE: &str = "vdsomity";
    pub const VIDEO_SOURCE_BITRATE: &str = "vdsobi";
    pub const VIDEO_SOURCE_FPS: &str = "vdsofs";
    pub const VIDEO_SOURCE_CODEC: &str = "vdsocc";
    pub const VIDEO_SOURCE_ADVERTISED_FRAME_RATE: &str = "vdsoatfrre";
    pub const VIDEO_HOLDBACK: &str = "vdhb";
    pub const VIDEO_PART_HOLDBACK: &str = "vdpthb";
    pub const VIDEO_PART_TARGET_DURATION: &str = "vdpttgdu";
    pub const VIDEO_TARGET_DURATION: &str = "vdtgdu";

    // environment
    pub const API_VERSION: &str = "fpaivn";
    pub const EMBED_VERSION: &str = "fpemvn";
    pub const EMBED: &str = "fpem";
    pub const DEVICE_ID: &str = "fpviid";
    pub const SESSION_ID: &str = "snid";
    pub const SESSION_START: &str = "snst";
    pub const SESSION_EXPIRES: &str = "snepti";

    // viewer
    pub const APPLICATION_ENGINE: &str = "viapei";
    pub const BROWSER: &str = "br";
    pub const BROWSER_VERSION: &str = "brvn";
    pub const OS_ARCHITECTURE: &str = "viosar";
    pub const CONNECTION_TYPE: &str = "vicity";
    pub const DEVICE_CATEGORY: &str = "decg";
    pub const DEVICE_MANUFACTURER: &str = "demr";
    pub const DEVICE_NAME: &str = "dena";
    pub const OS_FAMILY: &str = "viosfy";
    pub const OS_VERSION: &str = "viosvn";
    pub const DEVICE_MODEL: &str = "demo";

    // orientation
    pub const ORIENTATION_X: &str = "deorx";
    pub const ORIENTATION_Y: &str = "deory";
    pub const ORIENTATION_Z: &str = "deorz";

    // bandwidth
    pub const REQUEST_EVENT_TYPE: &str = "rqevty";
    pub const REQUEST_START: &str = "rqst";
    pub const REQUEST_RESPONSE_START: &str = "rqrpst";
    pub const REQUEST_RESPONSE_END: &str = "rqrped";
    pub const REQUEST_LATENCY: &str = "rqlt";
    pub const REQUEST_THROUGHPUT: &str = "rqth";
    pub const REQUEST_BYTES_LOADED: &str = "rqbyld";
    pub const REQUEST_TYPE: &str = "rqty";
    pub const REQUEST_RESPONSE_HEADERS: &str = "rqrphs";
    pub const REQUEST_HOSTNAME: &str = "rqhn";
    pub const REQUEST_MEDIA_DURATION: &str = "rqmedu";
    pub const REQUEST_CURRENT_LEVEL: &str = "rqcule";
    pub const REQUEST_MEDIA_START_TIME: &str = "rqmestti";
    pub const REQUEST_VIDEO_WIDTH: &str = "rqvdwt";
    pub const REQUEST_VIDEO_HEIGHT: &str = "rqvdht";
    pub const REQUEST_ERROR: &str = "rqer";
    pub const REQUEST_URL: &str = "rqur";
    pub const REQUEST_ERROR_TEXT: &str = "rqerte";
    pub const REQUEST_ERROR_CODE: &str = "rqercd";
    pub const REQUEST_LABELED_BITRATE: &str = "rqlbbi";
    pub const REQUEST_RENDITION_LIST: &str = "rqrnls";
    pub const REQUEST_CANCEL: &str = "rqca";
    pub const REQUEST_ID: &str = "rqid";
    pub const MEDIA: &str = "media";
}

const PLAYER_KEYS: &[&str] = &[
    "paloti", "paur", "plauon", "plispu", "plpron", "plisfl", "plercd", "plerms", "plercx",
    "plht", "plwt", "plinid", "plsqnu", "plphti", "plswna", "plswvn", "plfpsdna", "plfpsdvn",
    "plloti", "plspti", "plveco", "plpmti", "plmfnepmti", "pllncd",
];

const CUSTOMER_PLAYER_KEYS: &[&str] = &[
    "exna", "paty", "plitti", "plna", "plvn", "wsid", "suppid", "viusid", "plauon",
];

const VIEW_KEYS: &[&str] = &[
    "verqco", "verqfaco", "verqclco", "veid", "vest", "vesqnu", "vitp", "vewati", "verbco",
    "verbdu", "verbfq", "verbpg", "veseco", "vesedu", "vemaseti", "vemauppg", "vemadopg",
    "vetlctpbti", "vetlug", "vetldg", "vectpbti", "vemaphps", "vetitofifr", "vemnrqth",
    "veavrqth", "vemarqlt", "veavrqlt", "vedeor", "vedrfrco", "vepmch", "vedrty", "veedti",
    "veperqco", "vepeadid", "vepecrid", "veperd", "vepepy", "veperqti", "vespperqti",
    "vepeloti", "vesppeoti", "vetitope", "vemltitofiad", "vepgvw", "vewgrbco", "vewgrbdu",
];

const VIDEO_KEYS: &[&str] = &[
    "vdpour", "vdsobi", "vdsoatfrre", "vdsodn", "vdsodu", "vdsoht", "vdsohn", "vdsoisli",
    "vdsomity", "vdsour", "vdsowt", "vdhb", "vdpthb", "vdpttgdu", "vdtgdu", "vdsocc", "vdsofs",
];

const CUSTOMER_VIDEO_KEYS: &[&str] = &[
    "vdes", "vdid", "vdtt", "cn", "vdctty", "vddu", "vdeova", "vdisli", "vdlncd", "vdpd",
    "vdsr", "vdsmty", "vdvaid", "vdvana", "vdsour",
];

const CUSTOMER_VIEW_KEYS: &[&str] = &["ilvesnid", "ilvdes", "vesnid"];

const CUSTOMER_VIEWER_KEYS: &[&str] = &[
    "fpvidecg", "fpvidemr", "fpvidena", "fpviosfy", "fpviosvn", "fpvidemo",
];

const VIEWER_KEYS: &[&str] = &[
    "viapei", "br", "brvn", "viosar", "vicity", "vitp", "decg", "demr", "dena", "viosfy",
    "viosvn", "demo",
];

const ENVIRONMENT_KEYS: &[&str] = &[
    "db", "fpaivn", "fpemvn", "fpem", "fpviid", "snepti", "snid", "snst",
];

const BANDWIDTH_KEYS: &[&str] = &[
    "rqevty", "rqst", "rqrpst", "rqrped", "rqlt", "rqth", "rqbyld", "rqty", "rqrphs", "rqhn",
    "rqmedu", "rqcule", "rqmestti", "rqvdwt", "rqvdht", "rqer", "rqur", "rqerte", "rqercd",
    "rqlbbi", "rqrnls", "rqca", "rqid", "media",
];

const CUSTOM_KEYS: &[&str] = &[
    "cm1", "cm2", "cm3", "cm4", "cm5", "cm6", "cm7", "cm8", "cm9", "cm10",
];

const ORIENTATION_KEYS: &[&str] = &["deorx", "deory", "deorz"];

impl EntityKind {
    /// Keys declared for this entity. `Query` declares none and accepts any.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Player => PLAYER_KEYS,
            Self::CustomerPlayer => CUSTOMER_PLAYER_KEYS,
            Self::View => VIEW_KEYS,
            Self::Video => VIDEO_KEYS,
            Self::CustomerVideo => CUSTOMER_VIDEO_KEYS,
            Self::CustomerView => CUSTOMER_VIEW_KEYS,
            Self::CustomerViewer => CUSTOMER_VIEWER_KEYS,
            Self::Viewer => VIEWER_KEYS,
            Self::Environment => ENVIRONMENT_KEYS,
            Self::Bandwidth => BANDWIDTH_KEYS,
            Self::Custom => CUSTOM_KEYS,
            Self::Orientation => ORIENTATION_KEYS,
            Self::Query => &[],
        }
    }

    pub fn declares(self, key: &str) -> bool {
        self == Self::Query || self.keys().contains(&key)
    }
}
