//! Flat L2 coarse quantizer: `nlist` centroids used to route a vector to an
//! inverted list and to rank the `nprobe` nearest lists for a query.

use super::kmeans::kmeans;

/// Flat L2 coarse quantizer holding `nlist` centroids of `dim` elements each.
#[derive(Debug, Clone)]
pub struct CoarseQuantizer {
    centroids: Vec<f32>,
    dim: usize,
    nlist: usize,
}

impl CoarseQuantizer {
    /// Builds an untrained quantizer shell (zeroed centroids); call
    /// [`Self::train`] before using it to assign vectors.
    #[must_use]
    pub fn new(dim: usize, nlist: usize) -> Self {
        Self {
            centroids: vec![0.0; dim * nlist],
            dim,
            nlist,
        }
    }

    /// Number of coarse centroids (`nlist`).
    #[must_use]
    pub const fn nlist(&self) -> usize {
        self.nlist
    }

    /// Trains `nlist` centroids over `training_rows` (row-major, `dim`-wide)
    /// by `iterations` passes of Lloyd's algorithm.
    pub fn train(&mut self, training_rows: &[f32], n: usize, iterations: usize) {
        self.centroids = kmeans(training_rows, n, self.dim, self.nlist, iterations);
    }

    /// Centroid `i`.
    #[must_use]
    pub fn centroid(&self, i: usize) -> &[f32] {
        &self.centroids[i * self.dim..(i + 1) * self.dim]
    }

    /// All centroids, row-major.
    #[must_use]
    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    /// Rebuilds a quantizer from codec-read centroids, skipping training.
    ///
    /// # Panics
    ///
    /// Panics if `centroids.len() != dim * nlist`.
    #[must_use]
    pub fn from_parts(dim: usize, nlist: usize, centroids: Vec<f32>) -> Self {
        assert_eq!(centroids.len(), dim * nlist, "coarse: centroid count mismatch");
        Self { centroids, dim, nlist }
    }

    /// Assigns `vector` to its single nearest centroid, returning
    /// `(list_no, squared_distance)`.
    #[must_use]
    pub fn assign(&self, vector: &[f32]) -> (usize, f32) {
        self.nearest(vector, 1)[0]
    }

    /// Returns the `nprobe` nearest centroids to `query` as
    /// `(list_no, squared_distance)`, ascending by distance. `nprobe` is
    /// clamped to `nlist`.
    #[must_use]
    pub fn nearest(&self, query: &[f32], nprobe: usize) -> Vec<(usize, f32)> {
        let nprobe = nprobe.min(self.nlist).max(1);
        let mut all: Vec<(usize, f32)> = (0..self.nlist)
            .map(|i| (i, squared_l2(query, self.centroid(i))))
            .collect();
        all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        all.truncate(nprobe);
        all
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_to_closest_centroid() {
        let mut cq = CoarseQuantizer::new(2, 2);
        cq.train(&[0.0, 0.0, 10.0, 10.0], 2, 1);
        let (list, _) = cq.assign(&[9.5, 9.5]);
        assert_eq!(cq.centroid(list).len(), 2);
    }

    #[test]
    fn nearest_is_clamped_to_nlist() {
        let mut cq = CoarseQuantizer::new(2, 3);
        cq.train(&[0.0, 0.0, 1.0, 1.0, 2.0, 2.0], 3, 2);
        let probes = cq.nearest(&[0.0, 0.0], 100);
        assert_eq!(probes.len(), 3);
    }
}
