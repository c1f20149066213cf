use crate::error::{Dims, Error, Result};

/// An 8-bit pixel buffer with interleaved channels.
///
/// Samples are stored row-major with the channels of one pixel adjacent:
/// `index = (y * width + x) * channels + channel`. The buffer length and
/// channel count are validated once here, so accessors index without
/// per-sample checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing buffer. Fails unless `channels` is 1 or 3 and
    /// `data.len() == width * height * channels`.
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        if channels != 1 && channels != 3 {
            return Err(Error::InvalidFrame(format!(
                "unsupported channel count {channels} (expected 1 or 3)"
            )));
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "buffer holds {} samples but {width}x{height}x{channels} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A frame with every sample set to `value`.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Result<Self> {
        Self::new(width, height, channels, vec![value; width * height * channels])
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn dims(&self) -> Dims {
        Dims {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Flat offset of sample `channel` of pixel `(x, y)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, channel: usize) -> usize {
        (y * self.width + x) * self.channels + channel
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize, channel: usize) -> u8 {
        self.data[self.index(x, y, channel)]
    }

    /// Samples per block of side `block_size` in this frame.
    #[inline]
    pub fn block_len(&self, block_size: usize) -> usize {
        block_size * block_size * self.channels
    }

    /// Check that this frame tiles exactly into `block_size` squares.
    pub fn check_partitionable(&self, block_size: usize) -> Result<()> {
        if block_size == 0 || self.width % block_size != 0 || self.height % block_size != 0 {
            return Err(Error::UnpartitionableFrame {
                width: self.width,
                height: self.height,
                block_size,
            });
        }
        Ok(())
    }

    /// Number of aligned blocks. Only meaningful after
    /// [`check_partitionable`](Self::check_partitionable) succeeded.
    pub fn block_count(&self, block_size: usize) -> usize {
        (self.width / block_size) * (self.height / block_size)
    }

    /// Fail with `DimensionMismatch` unless `other` has the same shape.
    pub fn ensure_same_dims(&self, other: &Frame, context: &'static str) -> Result<()> {
        if self.dims() != other.dims() {
            return Err(Error::DimensionMismatch {
                context,
                expected: self.dims(),
                found: other.dims(),
            });
        }
        Ok(())
    }

    /// Whether a `block_size` square with top-left `(x, y)` lies fully inside.
    pub fn contains_block(&self, x: usize, y: usize, block_size: usize) -> bool {
        x + block_size <= self.width && y + block_size <= self.height
    }

    /// Copy the block at `(x, y)` into `out` (cleared first).
    ///
    /// The caller guarantees the block lies inside the frame.
    pub fn copy_block_into(&self, x: usize, y: usize, block_size: usize, out: &mut Vec<u8>) {
        out.clear();
        let row_len = block_size * self.channels;
        for dy in 0..block_size {
            let start = self.index(x, y + dy, 0);
            out.extend_from_slice(&self.data[start..start + row_len]);
        }
    }

    /// The block at `(x, y)` as an owned sample vector.
    pub fn block(&self, x: usize, y: usize, block_size: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.block_len(block_size));
        self.copy_block_into(x, y, block_size, &mut out);
        out
    }

    /// Write `samples` (row-major, `block_len` long) as the block at `(x, y)`.
    pub fn put_block(&mut self, x: usize, y: usize, block_size: usize, samples: &[u8]) {
        let row_len = block_size * self.channels;
        for (dy, row) in samples.chunks_exact(row_len).enumerate() {
            let start = self.index(x, y + dy, 0);
            self.data[start..start + row_len].copy_from_slice(row);
        }
    }
}
