//! Per-row statistics over a [`CircularBuffer`].
//!
//! Missing readings and never-written slots are skipped everywhere; a row with nothing
//! present yields the neutral value documented on each method.

use std::collections::BTreeMap;

use super::CircularBuffer;

impl CircularBuffer {
    fn present(&self, row: usize) -> impl Iterator<Item = i8> + '_ {
        self.raw_row(row).iter().filter_map(|rss| rss.value())
    }

    fn per_row<T>(&self, f: impl Fn(usize) -> T) -> Vec<T> {
        (0..self.rows()).map(f).collect()
    }

    /// Readings present in each row.
    pub fn present_count(&self) -> Vec<usize> {
        self.per_row(|row| self.present(row).count())
    }

    /// Sum of each row's readings; 0 for an empty row.
    pub fn row_sum(&self) -> Vec<i64> {
        self.per_row(|row| self.present(row).map(i64::from).sum())
    }

    /// Product of each row's readings; 1 for an empty row.
    pub fn row_product(&self) -> Vec<f64> {
        self.per_row(|row| self.present(row).map(f64::from).product())
    }

    /// Mean of each row; 0 for an empty row.
    pub fn mean(&self) -> Vec<f64> {
        self.per_row(|row| row_mean(self.present(row)).unwrap_or(0.0))
    }

    /// Population variance of each row; 0 for an empty row.
    pub fn variance(&self) -> Vec<f64> {
        self.per_row(|row| {
            let Some(mean) = row_mean(self.present(row)) else {
                return 0.0;
            };
            let (sum, n) = self
                .present(row)
                .fold((0.0, 0usize), |(sum, n), v| (sum + (f64::from(v) - mean).powi(2), n + 1));
            sum / n as f64
        })
    }

    /// Median of each row, averaging the middle pair; `None` for an empty row.
    pub fn median(&self) -> Vec<Option<f64>> {
        self.per_row(|row| {
            let mut values: Vec<i8> = self.present(row).collect();
            if values.is_empty() {
                return None;
            }
            values.sort_unstable();
            let mid = values.len() / 2;
            Some(if values.len() % 2 == 0 {
                (f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0
            } else {
                f64::from(values[mid])
            })
        })
    }

    /// Median of each row, falling back to that row's last defined median.
    ///
    /// Rows that have never had a defined median stay `None`.
    pub fn median_with_carry_forward(&mut self) -> Vec<Option<f64>> {
        let medians = self.median();
        for (carry, current) in self.prev_median.iter_mut().zip(medians) {
            if current.is_some() {
                *carry = current;
            }
        }
        self.prev_median.clone()
    }

    /// Forget the carried medians.
    pub fn clear_median_carry(&mut self) {
        self.prev_median.fill(None);
    }

    /// Most frequent reading of each row, the smallest on ties; `None` for an empty row.
    pub fn mode(&self) -> Vec<Option<i8>> {
        self.per_row(|row| {
            let mut counts = BTreeMap::new();
            for v in self.present(row) {
                *counts.entry(v).or_insert(0usize) += 1;
            }
            // BTreeMap iterates in ascending order and max_by_key keeps the last maximum
            counts.into_iter().rev().max_by_key(|&(_, count)| count).map(|(value, _)| value)
        })
    }
}

fn row_mean(values: impl Iterator<Item = i8>) -> Option<f64> {
    let (sum, n) = values.fold((0i64, 0usize), |(sum, n), v| (sum + i64::from(v), n + 1));
    (n > 0).then(|| sum as f64 / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rss;

    fn buffer_with(depth: usize, observations: &[&[Option<i8>]]) -> CircularBuffer {
        let rows = observations[0].len();
        let mut buffer = CircularBuffer::new(depth, rows).unwrap();
        for obs in observations {
            let values: Vec<Rss> = obs.iter().map(|&v| Rss::from(v)).collect();
            buffer.add(&values).unwrap();
        }
        buffer
    }

    #[test]
    fn missing_readings_are_skipped() {
        let buffer = buffer_with(4, &[&[Some(-40), None], &[None, None], &[Some(-50), None]]);
        assert_eq!(buffer.present_count(), vec![2, 0]);
        assert_eq!(buffer.mean(), vec![-45.0, 0.0]);
        assert_eq!(buffer.median(), vec![Some(-45.0), None]);
        assert_eq!(buffer.variance(), vec![25.0, 0.0]);
        assert_eq!(buffer.row_sum(), vec![-90, 0]);
        assert_eq!(buffer.row_product(), vec![2000.0, 1.0]);
    }

    #[test]
    fn wire_sentinel_never_counts() {
        let buffer = buffer_with(3, &[&[Some(127)], &[Some(-60)], &[Some(127)]]);
        assert_eq!(buffer.present_count(), vec![1]);
        assert_eq!(buffer.mean(), vec![-60.0]);
    }

    #[test]
    fn median_of_odd_count_is_middle_value() {
        let buffer = buffer_with(3, &[&[Some(-70)], &[Some(-40)], &[Some(-55)]]);
        assert_eq!(buffer.median(), vec![Some(-55.0)]);
    }

    #[test]
    fn mode_prefers_smallest_on_ties() {
        let buffer = buffer_with(
            5,
            &[
                &[Some(-40), Some(-30), None],
                &[Some(-50), Some(-30), None],
                &[Some(-40), Some(-20), None],
                &[Some(-50), Some(-20), None],
                &[Some(-60), Some(-30), None],
            ],
        );
        assert_eq!(buffer.mode(), vec![Some(-50), Some(-30), None]);
    }

    #[test]
    fn carry_forward_keeps_last_defined_median() {
        let mut buffer = CircularBuffer::new(2, 2).unwrap();
        assert_eq!(buffer.median_with_carry_forward(), vec![None, None]);

        buffer.add(&[Rss::new(-40), Rss::MISSING]).unwrap();
        buffer.add(&[Rss::new(-50), Rss::MISSING]).unwrap();
        assert_eq!(buffer.median_with_carry_forward(), vec![Some(-45.0), None]);

        buffer.add(&[Rss::MISSING, Rss::new(-70)]).unwrap();
        buffer.add(&[Rss::MISSING, Rss::MISSING]).unwrap();
        assert_eq!(buffer.median(), vec![None, Some(-70.0)]);
        assert_eq!(buffer.median_with_carry_forward(), vec![Some(-45.0), Some(-70.0)]);
    }

    #[test]
    fn reset_keeps_carry_until_cleared() {
        let mut buffer = buffer_with(2, &[&[Some(-40)]]);
        assert_eq!(buffer.median_with_carry_forward(), vec![Some(-40.0)]);

        buffer.reset();
        assert_eq!(buffer.median(), vec![None]);
        assert_eq!(buffer.median_with_carry_forward(), vec![Some(-40.0)]);

        buffer.clear_median_carry();
        assert_eq!(buffer.median_with_carry_forward(), vec![None]);
    }
}
