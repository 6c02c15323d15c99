//! Running average of magnitude spectra over a small ring of rows

/// Ring of `capacity` magnitude rows, each `bins` wide.
///
/// Rows are written at `write_index`, which cycles through `0..depth`.
/// The mean is always taken over the first `ave_size` rows of the ring,
/// where `ave_size` grows by one per fold until it reaches `depth`.
/// Once the ring is full this is every live row.
#[derive(Debug, Clone)]
pub struct AveragingWindow {
    rows: Vec<f64>,
    bins: usize,
    capacity: usize,
    depth: usize,
    write_index: usize,
    ave_size: usize,
}

impl AveragingWindow {
    /// New window averaging over all `capacity` rows
    pub fn new(capacity: usize, bins: usize) -> Self {
        assert!(capacity >= 1);
        Self {
            rows: vec![0f64; capacity * bins],
            bins,
            capacity,
            depth: capacity,
            write_index: 0,
            ave_size: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn ave_size(&self) -> usize {
        self.ave_size
    }

    /// Restart the average, the next fold behaves like the first one
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.ave_size = 1;
    }

    /// Change the depth and restart. The caller is responsible for keeping
    /// `depth` inside `1..=capacity`.
    pub fn set_depth(&mut self, depth: usize) {
        assert!((1..=self.capacity).contains(&depth));
        // Reset first so there's never a depth the cursors don't agree with
        self.reset();
        self.depth = depth;
    }

    fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.rows[row * self.bins..(row + 1) * self.bins]
    }

    /// Write `row` at the cursor, put the new mean into `mean` and advance
    pub fn fold(&mut self, row: &[f64], mean: &mut [f64]) {
        assert_eq!(row.len(), self.bins);
        assert_eq!(mean.len(), self.bins);
        let idx = self.write_index;
        self.row_mut(idx).copy_from_slice(row);

        mean.iter_mut().for_each(|m| *m = 0.0);
        for chunk in self.rows.chunks_exact(self.bins).take(self.ave_size) {
            for (m, v) in mean.iter_mut().zip(chunk) {
                *m += v;
            }
        }
        let n = self.ave_size as f64;
        mean.iter_mut().for_each(|m| *m /= n);

        self.write_index = if self.write_index + 1 >= self.depth {
            0
        } else {
            self.write_index + 1
        };
        if self.ave_size < self.depth {
            self.ave_size += 1;
        }
    }
}
