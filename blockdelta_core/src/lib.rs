pub mod compressor;
pub mod driver;
pub mod error;
pub mod format;
pub mod frame;
pub mod imageio;
pub mod matcher;
pub mod metadata;
pub mod metric;
pub mod params;
pub mod partition;
pub mod reader;
pub mod residual;
pub mod sequence;
pub mod writer;

pub use compressor::Compressor;
pub use error::{Dims, Error, Result};
pub use format::{BlobEntry, PackHeader, PACK_HEADER_SIZE, PACK_MAGIC};
pub use frame::Frame;
pub use imageio::ColorMode;
pub use matcher::MatchRecord;
pub use metadata::MetaHeader;
pub use params::{CodecParams, MatchPolicy};
pub use reader::{BlobReader, StoredBlob};
pub use residual::{Encoded, ResidualCodec};
pub use sequence::MultiFrameEncoder;
pub use writer::BlobWriter;
