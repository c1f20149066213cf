use std::fmt;

use thiserror::Error;

/// Result alias for the block codec.
pub type Result<T> = std::result::Result<T, Error>;

/// Width, height and channel count of a frame, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Fatal conditions raised by partitioning, matching, encoding and decoding.
///
/// "No match" is not an error: a search space too small for any candidate
/// yields the sentinel [`MatchRecord`](crate::MatchRecord).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two frames that must agree in shape do not.
    #[error("dimension mismatch ({context}): expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: Dims,
        found: Dims,
    },

    /// Metadata length differs from the number of blocks in the frame.
    #[error("malformed metadata: {records} records for a frame of {blocks} blocks")]
    MalformedMetadata { records: usize, blocks: usize },

    /// Frame dimensions are not a multiple of the block size.
    #[error("frame {width}x{height} cannot be partitioned into {block_size}x{block_size} blocks")]
    UnpartitionableFrame {
        width: usize,
        height: usize,
        block_size: usize,
    },

    /// Buffer length or channel count is inconsistent.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// SAD was asked to compare blocks of different sizes.
    #[error("block sample count mismatch: {left} vs {right}")]
    SampleCountMismatch { left: usize, right: usize },

    /// A metadata record points outside the reference frame.
    #[error("block {block}: match at ({x}, {y}) does not address a full block in the reference frame")]
    MatchOutOfBounds { block: usize, x: i32, y: i32 },

    /// Failure of one frame inside a sequence encode.
    #[error("frame {index}: {source}")]
    SequenceFrame {
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn in_frame(self, index: usize) -> Self {
        Error::SequenceFrame {
            index,
            source: Box::new(self),
        }
    }
}
