//! Product quantizer (C7): splits a `d`-wide (sub)vector into `M` sub-vectors
//! and encodes each independently against a `2^nbits`-centroid codebook.

use super::kmeans::kmeans;

/// Product quantizer with `m` sub-quantizers of `2^nbits` centroids each.
#[derive(Debug, Clone)]
pub struct ProductQuantizer {
    dim: usize,
    m: usize,
    nbits: u32,
    sub_dim: usize,
    ksub: usize,
    /// `centroids[sub * ksub * sub_dim + code * sub_dim .. +sub_dim]`.
    centroids: Vec<f32>,
}

impl ProductQuantizer {
    /// Builds an untrained quantizer shell. `dim` must be divisible by `m`.
    ///
    /// # Panics
    ///
    /// Panics if `dim % m != 0` or `nbits` is 0 or too large to index a
    /// `usize` codebook size.
    #[must_use]
    pub fn new(dim: usize, m: usize, nbits: u32) -> Self {
        assert!(m > 0 && dim % m == 0, "pq: dim {dim} not divisible by m {m}");
        assert!((1..=16).contains(&nbits), "pq: nbits {nbits} out of range");
        let sub_dim = dim / m;
        let ksub = 1usize << nbits;
        Self {
            dim,
            m,
            nbits,
            sub_dim,
            ksub,
            centroids: vec![0.0; m * ksub * sub_dim],
        }
    }

    /// Sub-quantizer count (`M`).
    #[must_use]
    pub const fn m(&self) -> usize {
        self.m
    }

    /// Bits per sub-code.
    #[must_use]
    pub const fn nbits(&self) -> u32 {
        self.nbits
    }

    /// Centroids per sub-quantizer (`2^nbits`).
    #[must_use]
    pub const fn ksub(&self) -> usize {
        self.ksub
    }

    /// Code size in bytes (`M`, one byte per sub-code since `nbits <= 16`
    /// collapses to one byte for the `nbits <= 8` common case; for
    /// `nbits > 8` this crate stores two bytes per sub-code).
    #[must_use]
    pub const fn code_bytes_per_sub(&self) -> usize {
        if self.nbits <= 8 {
            1
        } else {
            2
        }
    }

    /// Encoded row width in bytes (`M * code_bytes_per_sub`).
    #[must_use]
    pub const fn code_size(&self) -> usize {
        self.m * self.code_bytes_per_sub()
    }

    /// Trains all `M` sub-quantizers independently over `training_rows`
    /// (`n` rows of `dim` elements), `iterations` Lloyd's passes each.
    pub fn train(&mut self, training_rows: &[f32], n: usize, iterations: usize) {
        for sub in 0..self.m {
            let mut sub_rows = vec![0.0f32; n * self.sub_dim];
            for row in 0..n {
                let src = &training_rows
                    [row * self.dim + sub * self.sub_dim..row * self.dim + (sub + 1) * self.sub_dim];
                sub_rows[row * self.sub_dim..(row + 1) * self.sub_dim].copy_from_slice(src);
            }
            let sub_centroids = kmeans(&sub_rows, n, self.sub_dim, self.ksub, iterations);
            let dst = &mut self.centroids[sub * self.ksub * self.sub_dim..(sub + 1) * self.ksub * self.sub_dim];
            dst.copy_from_slice(&sub_centroids);
        }
    }

    /// All sub-quantizer centroids, flat (`m * ksub * sub_dim` elements),
    /// for the codec writer.
    #[must_use]
    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    /// Rebuilds a quantizer from codec-read centroids, skipping training.
    ///
    /// # Panics
    ///
    /// Panics if `dim % m != 0`, `nbits` is out of range, or
    /// `centroids.len()` doesn't match the implied shape.
    #[must_use]
    pub fn from_parts(dim: usize, m: usize, nbits: u32, centroids: Vec<f32>) -> Self {
        let mut pq = Self::new(dim, m, nbits);
        assert_eq!(centroids.len(), pq.centroids.len(), "pq: centroid count mismatch");
        pq.centroids = centroids;
        pq
    }

    fn sub_centroid(&self, sub: usize, code: usize) -> &[f32] {
        let base = sub * self.ksub * self.sub_dim + code * self.sub_dim;
        &self.centroids[base..base + self.sub_dim]
    }

    /// Encodes `vector` (length `dim`) into `code_size()` bytes, one entry
    /// per sub-quantizer packed little-endian at `code_bytes_per_sub()`
    /// width.
    ///
    /// # Panics
    ///
    /// Panics if `vector.len() != dim`.
    #[must_use]
    pub fn encode(&self, vector: &[f32]) -> Vec<u8> {
        assert_eq!(vector.len(), self.dim, "pq encode: dimension mismatch");
        let mut out = Vec::with_capacity(self.code_size());
        for sub in 0..self.m {
            let sub_vec = &vector[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            let mut best = 0usize;
            let mut best_dist = f32::INFINITY;
            for code in 0..self.ksub {
                let dist = squared_l2(sub_vec, self.sub_centroid(sub, code));
                if dist < best_dist {
                    best_dist = dist;
                    best = code;
                }
            }
            push_code(&mut out, best, self.code_bytes_per_sub());
        }
        out
    }

    /// Decodes `code` (`code_size()` bytes) back into a `dim`-wide
    /// reconstruction by concatenating each sub-quantizer's chosen centroid.
    ///
    /// # Panics
    ///
    /// Panics if `code.len() != code_size()`.
    #[must_use]
    pub fn decode(&self, code: &[u8]) -> Vec<f32> {
        assert_eq!(code.len(), self.code_size(), "pq decode: code size mismatch");
        let mut out = Vec::with_capacity(self.dim);
        let width = self.code_bytes_per_sub();
        for sub in 0..self.m {
            let idx = read_code(&code[sub * width..(sub + 1) * width]);
            out.extend_from_slice(self.sub_centroid(sub, idx));
        }
        out
    }

    /// Reads sub-quantizer `sub`'s code out of a packed `code` row.
    #[must_use]
    pub fn sub_code(&self, code: &[u8], sub: usize) -> usize {
        let width = self.code_bytes_per_sub();
        read_code(&code[sub * width..(sub + 1) * width])
    }

    /// Builds the ADC lookup table for `query` (already residualized against
    /// the probed list's coarse centroid when `by_residual`): `M * ksub`
    /// entries, `table[sub * ksub + code]` is the squared L2 distance from
    /// `query`'s `sub`-th slice to that sub-quantizer's `code`-th centroid.
    ///
    /// # Panics
    ///
    /// Panics if `query.len() != dim`.
    #[must_use]
    pub fn build_adc_table(&self, query: &[f32]) -> Vec<f32> {
        assert_eq!(query.len(), self.dim, "pq adc table: dimension mismatch");
        let mut table = vec![0.0f32; self.m * self.ksub];
        for sub in 0..self.m {
            let q_sub = &query[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            for code in 0..self.ksub {
                table[sub * self.ksub + code] = squared_l2(q_sub, self.sub_centroid(sub, code));
            }
        }
        table
    }

    /// Sums the per-sub-quantizer ADC table entries named by `code`'s
    /// packed sub-codes: `sum_m table[m * ksub + decode(code, m)]`.
    #[must_use]
    pub fn adc_distance(&self, table: &[f32], code: &[u8]) -> f32 {
        let width = self.code_bytes_per_sub();
        let mut total = 0.0f32;
        for sub in 0..self.m {
            let idx = read_code(&code[sub * width..(sub + 1) * width]);
            total += table[sub * self.ksub + idx];
        }
        total
    }
}

fn push_code(out: &mut Vec<u8>, code: usize, width: usize) {
    if width == 1 {
        out.push(code as u8);
    } else {
        out.extend_from_slice(&(code as u16).to_le_bytes());
    }
}

fn read_code(bytes: &[u8]) -> usize {
    if bytes.len() == 1 {
        bytes[0] as usize
    } else {
        u16::from_le_bytes([bytes[0], bytes[1]]) as usize
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained_pq() -> ProductQuantizer {
        let mut pq = ProductQuantizer::new(8, 4, 6);
        let mut rows = Vec::new();
        for i in 0..64 {
            for d in 0..8 {
                rows.push((i * 8 + d) as f32 * 0.1);
            }
        }
        pq.train(&rows, 64, 5);
        pq
    }

    #[test]
    fn encode_decode_round_trips_approximately() {
        let pq = trained_pq();
        let vector: Vec<f32> = (0..8).map(|d| d as f32 * 0.37).collect();
        let code = pq.encode(&vector);
        assert_eq!(code.len(), pq.code_size());
        let decoded = pq.decode(&code);
        assert_eq!(decoded.len(), 8);
        let err: f32 = vector
            .iter()
            .zip(&decoded)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt();
        assert!(err < 5.0, "reconstruction error too large: {err}");
    }

    #[test]
    fn adc_distance_matches_direct_distance_to_decoded() {
        let pq = trained_pq();
        let vector: Vec<f32> = (0..8).map(|d| d as f32 * 0.2).collect();
        let query: Vec<f32> = (0..8).map(|d| d as f32 * 0.25).collect();
        let code = pq.encode(&vector);
        let table = pq.build_adc_table(&query);
        let adc = pq.adc_distance(&table, &code);
        let decoded = pq.decode(&code);
        let direct = squared_l2(&query, &decoded);
        assert!((adc - direct).abs() < 1e-3, "adc={adc} direct={direct}");
    }
}
