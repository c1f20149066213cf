use serde::{Deserialize, Serialize};

/// Default side of a square block, in pixels.
pub const DEFAULT_BLOCK_SIZE: usize = 8;

/// Default half-width of the search neighborhood, in pixels.
pub const DEFAULT_RADIUS: usize = 4;

/// Default SAD threshold for single-channel frames.
pub const DEFAULT_LUMA_THRESHOLD: u64 = 90;

/// Default SAD threshold for 3-channel frames (three samples per pixel).
pub const DEFAULT_RGB_THRESHOLD: u64 = 270;

/// How the matcher chooses among candidates, and how the residual codec
/// stores matched blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Lowest SAD over the whole neighborhood wins; matched blocks carry a
    /// wrapped difference so decoding is exact.
    Minimize,
    /// The last candidate in scan order with SAD below the threshold wins;
    /// matched blocks carry no residual and decode to the reference block.
    ThresholdAccept,
}

impl MatchPolicy {
    /// On-disk tag used by the metadata file header.
    pub fn tag(self) -> u8 {
        match self {
            MatchPolicy::Minimize => 0,
            MatchPolicy::ThresholdAccept => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MatchPolicy::Minimize),
            1 => Some(MatchPolicy::ThresholdAccept),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MatchPolicy::Minimize => "minimize",
            MatchPolicy::ThresholdAccept => "threshold",
        }
    }
}

/// Parameters shared by every block of an encode or decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecParams {
    pub block_size: usize,
    pub radius: usize,
    /// Only consulted under [`MatchPolicy::ThresholdAccept`].
    pub threshold: u64,
    pub policy: MatchPolicy,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            radius: DEFAULT_RADIUS,
            threshold: DEFAULT_LUMA_THRESHOLD,
            policy: MatchPolicy::ThresholdAccept,
        }
    }
}

impl CodecParams {
    /// Defaults with the threshold scaled for `channels` samples per pixel.
    pub fn for_channels(channels: usize) -> Self {
        Self {
            threshold: if channels == 3 {
                DEFAULT_RGB_THRESHOLD
            } else {
                DEFAULT_LUMA_THRESHOLD
            },
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }
}
