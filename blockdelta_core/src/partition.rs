use crate::error::Result;
use crate::frame::Frame;

/// Top-left corner of an aligned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: usize,
    pub y: usize,
}

/// Aligned block positions of a `width x height` frame in raster order.
///
/// This order indexes the metadata sequence: block `i` of a frame is the
/// `i`-th position yielded here.
pub fn positions(width: usize, height: usize, block_size: usize) -> Vec<BlockPos> {
    let mut out = Vec::with_capacity((width / block_size) * (height / block_size));
    for y in (0..height).step_by(block_size) {
        for x in (0..width).step_by(block_size) {
            out.push(BlockPos { x, y });
        }
    }
    out
}

/// Split `frame` into `block_size` squares, rows of blocks top to bottom,
/// blocks left to right within a row.
pub fn cut(frame: &Frame, block_size: usize) -> Result<Vec<(BlockPos, Vec<u8>)>> {
    frame.check_partitionable(block_size)?;
    Ok(positions(frame.width(), frame.height(), block_size)
        .into_iter()
        .map(|pos| (pos, frame.block(pos.x, pos.y, block_size)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn gradient(width: usize, height: usize, channels: usize) -> Frame {
        let data = (0..width * height * channels).map(|i| (i % 251) as u8).collect();
        Frame::new(width, height, channels, data).unwrap()
    }

    #[test]
    fn block_count_and_size() {
        for &(w, h, c, bs) in &[(16, 8, 1, 8), (32, 24, 3, 8), (12, 12, 1, 4), (8, 8, 3, 8)] {
            let blocks = cut(&gradient(w, h, c), bs).unwrap();
            assert_eq!(blocks.len(), (w / bs) * (h / bs));
            assert!(blocks.iter().all(|(_, b)| b.len() == bs * bs * c));
        }
    }

    #[test]
    fn raster_order_rows_then_columns() {
        let blocks = cut(&gradient(16, 16, 1), 8).unwrap();
        let order: Vec<(usize, usize)> = blocks.iter().map(|(p, _)| (p.x, p.y)).collect();
        assert_eq!(order, vec![(0, 0), (8, 0), (0, 8), (8, 8)]);
    }

    #[test]
    fn order_is_stable_across_calls() {
        let frame = gradient(24, 16, 3);
        assert_eq!(cut(&frame, 8).unwrap(), cut(&frame, 8).unwrap());
    }

    #[test]
    fn samples_row_major_with_channel_grouping() {
        let frame = gradient(8, 8, 3);
        let blocks = cut(&frame, 4).unwrap();
        let (pos, block) = &blocks[1];
        assert_eq!(*pos, BlockPos { x: 4, y: 0 });
        // Second pixel of the second row of the block, green channel.
        assert_eq!(block[(4 + 1) * 3 + 1], frame.sample(5, 1, 1));
    }

    #[test]
    fn indivisible_frame_is_rejected() {
        let err = cut(&gradient(10, 8, 1), 8).unwrap_err();
        assert!(matches!(err, Error::UnpartitionableFrame { width: 10, .. }));
    }
}
