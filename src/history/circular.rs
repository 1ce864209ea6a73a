//! Fixed-depth per-link history

use crate::types::Rss;
use crate::{ListenError, Result};

/// A rows × depth ring of RSS readings, one row per link.
///
/// Every row has its own write cursor so that [`add_masked`](Self::add_masked) can
/// advance some links and leave others untouched. Slots that were never written read
/// as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularBuffer {
    depth: usize,
    rows: usize,
    /// Row-major, `rows * depth`
    cells: Vec<Rss>,
    cursors: Vec<usize>,
    num_obs: usize,
    pub(super) prev_median: Vec<Option<f64>>,
}

impl CircularBuffer {
    /// An empty buffer holding `depth` observations of `rows` links.
    ///
    /// # Errors
    ///
    /// [`ListenError::Config`] when `depth` or `rows` is zero.
    pub fn new(depth: usize, rows: usize) -> Result<Self> {
        if depth == 0 || rows == 0 {
            return Err(ListenError::config(format!(
                "history needs a positive depth and row count, got {} x {}",
                rows, depth
            )));
        }
        Ok(Self {
            depth,
            rows,
            cells: vec![Rss::MISSING; rows * depth],
            cursors: vec![0; rows],
            num_obs: 0,
            prev_median: vec![None; rows],
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Observations held, saturating at [`depth`](Self::depth).
    pub fn num_obs(&self) -> usize {
        self.num_obs
    }

    pub fn len(&self) -> usize {
        self.num_obs
    }

    pub fn is_empty(&self) -> bool {
        self.num_obs == 0
    }

    pub fn is_full(&self) -> bool {
        self.num_obs == self.depth
    }

    /// Append one observation, overwriting the oldest once full.
    ///
    /// # Errors
    ///
    /// [`ListenError::DimensionMismatch`] unless `values` has one entry per row. The
    /// buffer is unchanged on error.
    pub fn add(&mut self, values: &[Rss]) -> Result<()> {
        self.check_len("history observation", values.len())?;
        for (row, &value) in values.iter().enumerate() {
            self.write(row, value);
        }
        self.num_obs = (self.num_obs + 1).min(self.depth);
        Ok(())
    }

    /// Append to the rows where `mask` is set; other rows keep their cursor.
    ///
    /// # Errors
    ///
    /// - [`ListenError::BufferNotFull`] before the buffer has filled once
    /// - [`ListenError::DimensionMismatch`] when `values` or `mask` is the wrong length
    pub fn add_masked(&mut self, values: &[Rss], mask: &[bool]) -> Result<()> {
        if !self.is_full() {
            return Err(ListenError::BufferNotFull { num_obs: self.num_obs, depth: self.depth });
        }
        self.check_len("history observation", values.len())?;
        self.check_len("history mask", mask.len())?;

        for (row, (&value, _)) in values.iter().zip(mask).enumerate().filter(|(_, (_, m))| **m) {
            self.write(row, value);
        }
        Ok(())
    }

    /// The observation `offset` steps back from the newest write of each row
    /// (1 is the newest).
    ///
    /// # Errors
    ///
    /// [`ListenError::InvalidOffset`] unless `1 <= offset <= num_obs()`.
    pub fn get(&self, offset: usize) -> Result<Vec<Rss>> {
        if offset == 0 || offset > self.num_obs {
            return Err(ListenError::InvalidOffset { offset, available: self.num_obs });
        }
        Ok((0..self.rows)
            .map(|row| {
                let col = (self.cursors[row] + self.depth - offset) % self.depth;
                self.cells[row * self.depth + col]
            })
            .collect())
    }

    /// Each row's valid observations, oldest first.
    pub fn ordered_history(&self) -> Vec<Vec<Rss>> {
        (0..self.rows).map(|row| self.row_history(row).collect()).collect()
    }

    /// One row's valid observations, oldest first.
    pub fn row_history(&self, row: usize) -> impl Iterator<Item = Rss> + '_ {
        let cursor = self.cursors.get(row).copied().unwrap_or_default();
        let count = if row < self.rows { self.num_obs } else { 0 };
        (0..count).map(move |step| {
            let col = (cursor + self.depth - count + step) % self.depth;
            self.cells[row * self.depth + col]
        })
    }

    /// Every slot of a row in storage order, written or not.
    pub(super) fn raw_row(&self, row: usize) -> &[Rss] {
        &self.cells[row * self.depth..(row + 1) * self.depth]
    }

    /// Forget every observation. Dimensions and the median carry state are kept.
    pub fn reset(&mut self) {
        self.cells.fill(Rss::MISSING);
        self.cursors.fill(0);
        self.num_obs = 0;
    }

    fn write(&mut self, row: usize, value: Rss) {
        let cursor = self.cursors[row];
        self.cells[row * self.depth + cursor] = value;
        self.cursors[row] = (cursor + 1) % self.depth;
    }

    fn check_len(&self, context: &'static str, actual: usize) -> Result<()> {
        if actual != self.rows {
            return Err(ListenError::DimensionMismatch { context, expected: self.rows, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn obs(values: &[i8]) -> Vec<Rss> {
        values.iter().map(|&v| Rss::new(v)).collect()
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(CircularBuffer::new(0, 3), Err(ListenError::Config { .. })));
        assert!(matches!(CircularBuffer::new(3, 0), Err(ListenError::Config { .. })));
    }

    #[test]
    fn fills_then_wraps() {
        let mut buffer = CircularBuffer::new(3, 2).unwrap();
        assert!(buffer.is_empty());

        buffer.add(&obs(&[-10, -20])).unwrap();
        buffer.add(&obs(&[-11, -21])).unwrap();
        assert_eq!(buffer.num_obs(), 2);
        assert!(!buffer.is_full());
        assert_eq!(buffer.get(1).unwrap(), obs(&[-11, -21]));
        assert_eq!(buffer.get(2).unwrap(), obs(&[-10, -20]));
        assert!(matches!(buffer.get(3), Err(ListenError::InvalidOffset { offset: 3, available: 2 })));

        buffer.add(&obs(&[-12, -22])).unwrap();
        assert!(buffer.is_full());
        buffer.add(&obs(&[-13, -23])).unwrap();
        assert_eq!(buffer.num_obs(), 3);
        assert_eq!(buffer.get(3).unwrap(), obs(&[-11, -21]));
        assert_eq!(
            buffer.ordered_history(),
            vec![obs(&[-11, -12, -13]), obs(&[-21, -22, -23])]
        );
    }

    #[test]
    fn offset_zero_is_invalid() {
        let mut buffer = CircularBuffer::new(2, 1).unwrap();
        buffer.add(&obs(&[-10])).unwrap();
        assert!(matches!(buffer.get(0), Err(ListenError::InvalidOffset { .. })));
    }

    #[test]
    fn wrong_width_leaves_buffer_untouched() {
        let mut buffer = CircularBuffer::new(2, 2).unwrap();
        let before = buffer.clone();
        assert!(matches!(
            buffer.add(&obs(&[-10])),
            Err(ListenError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
        assert_eq!(buffer, before);
    }

    #[test]
    fn masked_add_needs_a_full_buffer() {
        let mut buffer = CircularBuffer::new(2, 2).unwrap();
        buffer.add(&obs(&[-10, -20])).unwrap();
        assert!(matches!(
            buffer.add_masked(&obs(&[-11, -21]), &[true, false]),
            Err(ListenError::BufferNotFull { num_obs: 1, depth: 2 })
        ));
    }

    #[test]
    fn masked_add_advances_only_masked_rows() {
        let mut buffer = CircularBuffer::new(2, 2).unwrap();
        buffer.add(&obs(&[-10, -20])).unwrap();
        buffer.add(&obs(&[-11, -21])).unwrap();

        buffer.add_masked(&obs(&[-12, -22]), &[true, false]).unwrap();
        assert_eq!(buffer.get(1).unwrap(), obs(&[-12, -21]));
        assert_eq!(buffer.get(2).unwrap(), obs(&[-11, -20]));
        assert!(matches!(
            buffer.add_masked(&obs(&[-12, -22]), &[true]),
            Err(ListenError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn reset_keeps_dimensions() {
        let mut buffer = CircularBuffer::new(2, 3).unwrap();
        buffer.add(&obs(&[-10, -20, -30])).unwrap();
        buffer.reset();
        assert_eq!(buffer.num_obs(), 0);
        assert_eq!((buffer.depth(), buffer.rows()), (2, 3));
        assert!(buffer.get(1).is_err());
        buffer.add(&obs(&[-1, -2, -3])).unwrap();
        assert_eq!(buffer.get(1).unwrap(), obs(&[-1, -2, -3]));
    }

    proptest! {
        #[test]
        fn newest_and_oldest_track_additions(depth in 1usize..12, extra in 0usize..12) {
            let mut buffer = CircularBuffer::new(depth, 2).unwrap();
            let total = depth + extra;
            for i in 0..total {
                let v = -(i as i8) - 1;
                buffer.add(&[Rss::new(v), Rss::MISSING]).unwrap();
            }

            prop_assert!(buffer.is_full());
            prop_assert_eq!(buffer.get(1).unwrap()[0], Rss::new(-(total as i8)));
            // The oldest survivor is addition number `extra + 1`
            prop_assert_eq!(buffer.get(depth).unwrap()[0], Rss::new(-(extra as i8) - 1));
            prop_assert_eq!(buffer.row_history(0).count(), depth);
        }
    }
}
