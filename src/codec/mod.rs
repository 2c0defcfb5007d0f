//! Versioned on-disk serialization of an IVF-PQ [`Index`] handle (C8).
//!
//! Two layers, in the order the writer emits them and the reader consumes
//! them:
//!
//! 1. **Base** — a structural encoding of the concrete index, introduced by
//!    a 4-byte magic tag: `IwPQ` for a plain IVF-PQ body, `IxPT` for one
//!    wrapped in a pre-transform chain. The header carries `{d, ntotal,
//!    dummy, dummy, is_trained, metric_type, metric_arg?, verbose}`,
//!    followed by the IVF-PQ body (coarse quantizer, `by_residual`,
//!    `code_size`, product-quantizer params/centroids) and an inverted-list
//!    descriptor tagged either `ilar` (array-of-lists, fully resident) or
//!    `ilbc` (block-cache descriptor: sizes only, raw codes/ids stay at
//!    their file offsets for lazy `pread`).
//! 2. **Overlay** — `range_search_confidence: f32` plus, per list in the
//!    same order as its entries, a length-prefixed `reconstruction_errors`
//!    vector.
//!
//! HNSW handles have no wire format defined here; the source treats HNSW's
//! own serialization as a family-specific reader this crate doesn't
//! respecify (only its search contract is in scope). [`write_index`] and
//! [`read_index`] return [`Error::Unsupported`] for [`Index::Hnsw`].

pub mod io;

use std::path::Path;
use std::sync::Arc;

use io::{Reader, Writer};

use crate::cache::BlockCache;
use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::index::ivf_pq::invlist::{
    BlockCacheInvertedLists, InMemoryInvertedLists, ListDescriptor, ListSource,
};
use crate::index::ivf_pq::{CoarseQuantizer, IvfPqBuildParams, IvfPqIndex, IvfPqSearchParams, ProductQuantizer};
use crate::index::pretransform::{IvfPqPreTransformIndex, PreTransformChain, PreTransformKind};
use crate::index::Index;
use crate::meta::IndexMeta;

const IWPQ_TAG: &[u8; 4] = b"IwPQ";
const IXPT_TAG: &[u8; 4] = b"IxPT";
const ILAR_TAG: &[u8; 4] = b"ilar";
const ILBC_TAG: &[u8; 4] = b"ilbc";

/// Writer-side knobs controlling the on-disk inverted-list representation.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Write an `ilbc` (block-cache) descriptor instead of a fully resident
    /// `ilar` body.
    pub cache_index_block: bool,
    /// Logical block size used to align `ilbc` windows at read time; only
    /// meaningful when `cache_index_block` is set.
    pub block_size: u64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            cache_index_block: false,
            block_size: 4096,
        }
    }
}

fn metric_tag(metric: Metric) -> u8 {
    match metric {
        Metric::L2 => 0,
        Metric::CosineSimilarity => 1,
        Metric::InnerProduct => 2,
        Metric::CosineDistance => 3,
    }
}

fn metric_from_tag(tag: u8) -> Result<Metric> {
    match tag {
        0 => Ok(Metric::L2),
        1 => Ok(Metric::CosineSimilarity),
        2 => Ok(Metric::InnerProduct),
        3 => Ok(Metric::CosineDistance),
        other => Err(Error::IndexCorrupted(format!(
            "codec: unknown metric tag {other}"
        ))),
    }
}

fn write_header(w: &mut Writer, dim: usize, ntotal: usize, is_trained: bool, metric: Metric, metric_arg: Option<f32>) {
    w.write_u32(dim as u32);
    w.write_u64(ntotal as u64);
    w.write_u32(0); // dummy
    w.write_u32(0); // dummy
    w.write_bool(is_trained);
    w.write_u8(metric_tag(metric));
    w.write_bool(metric_arg.is_some());
    if let Some(arg) = metric_arg {
        w.write_f32(arg);
    }
    w.write_bool(false); // verbose
}

struct Header {
    dim: usize,
    ntotal: usize,
    is_trained: bool,
    metric: Metric,
    metric_arg: Option<f32>,
}

fn read_header(r: &mut Reader) -> Result<Header> {
    let dim = r.read_u32()? as usize;
    let ntotal = r.read_u64()? as usize;
    let _dummy1 = r.read_u32()?;
    let _dummy2 = r.read_u32()?;
    let is_trained = r.read_bool()?;
    let metric = metric_from_tag(r.read_u8()?)?;
    let has_metric_arg = r.read_bool()?;
    let metric_arg = if has_metric_arg { Some(r.read_f32()?) } else { None };
    let _verbose = r.read_bool()?;
    Ok(Header {
        dim,
        ntotal,
        is_trained,
        metric,
        metric_arg,
    })
}

fn write_ivf_pq_body(
    w: &mut Writer,
    dim: usize,
    coarse: &CoarseQuantizer,
    pq: &ProductQuantizer,
    by_residual: bool,
    lists: &dyn ListSource,
    opts: WriteOptions,
) {
    w.write_u32(coarse.nlist() as u32);
    w.write_f32_vec(coarse.centroids());
    w.write_bool(by_residual);
    w.write_u32(pq.code_size() as u32);
    w.write_u32(dim as u32);
    w.write_u32(pq.m() as u32);
    w.write_u32(pq.nbits());
    w.write_f32_vec(pq.centroids());

    let nlist = coarse.nlist();
    let code_size = pq.code_size();
    if opts.cache_index_block {
        w.write_tag(ILBC_TAG);
        w.write_u64(opts.block_size);
        w.write_u32(nlist as u32);
        let descriptor_section_len = nlist * (8 + 4);
        // Position right after this call's descriptor placeholders: tag(4)
        // + block_size(8) + nlist(4) + descriptor_section_len, relative to
        // the writer's current length (computed below once we know it).
        let base = w.len() + descriptor_section_len;
        let mut offsets = Vec::with_capacity(nlist);
        let mut cursor = base as u64;
        for k in 0..nlist {
            let entries = lists.list_size(k) as u64;
            offsets.push((cursor, entries as u32));
            cursor += entries * (code_size as u64 + 8);
        }
        for (offset, entries) in &offsets {
            w.write_u64(*offset);
            w.write_u32(*entries);
        }
        for k in 0..nlist {
            w.write_raw(&lists.codes(k));
            for id in lists.ids(k) {
                w.write_i64(id);
            }
        }
    } else {
        w.write_tag(ILAR_TAG);
        for k in 0..nlist {
            let entries = lists.list_size(k);
            w.write_u32(entries as u32);
            w.write_raw(&lists.codes(k));
            for id in lists.ids(k) {
                w.write_i64(id);
            }
        }
    }
}

fn write_overlay(w: &mut Writer, range_search_confidence: f32, nlist: usize, lists: &dyn ListSource) {
    w.write_f32(range_search_confidence);
    for k in 0..nlist {
        w.write_f32_vec(lists.reconstruction_errors(k));
    }
}

/// Serializes `index` to `path`, applying `opts` to the inverted-list
/// representation.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] for an HNSW handle, or [`Error::Io`] if
/// `path` cannot be written.
pub fn write_index(path: &Path, index: &Index, meta: &IndexMeta, opts: WriteOptions) -> Result<()> {
    let bytes = match index {
        Index::Hnsw(_) => {
            return Err(Error::Unsupported(
                "codec: HNSW handles have no defined wire format".to_string(),
            ))
        }
        Index::IvfPq(ivf) => encode_ivf_pq(IWPQ_TAG, ivf, meta, opts, &PreTransformChain::default())?,
        Index::IvfPqPreTransform(wrapped) => encode_ivf_pq(
            IXPT_TAG,
            wrapped.inner(),
            meta,
            opts,
            wrapped.chain(),
        )?,
    };
    std::fs::write(path, bytes)?;
    Ok(())
}

fn encode_ivf_pq(
    tag: &[u8; 4],
    ivf: &IvfPqIndex,
    meta: &IndexMeta,
    opts: WriteOptions,
    chain: &PreTransformChain,
) -> Result<Vec<u8>> {
    let params = ivf.build_params();
    let metric_arg = meta.optional::<f64>(crate::meta::Section::Common, "metric_arg")?.map(|v| v as f32);

    let mut w = Writer::new();
    w.write_tag(tag);
    if tag == IXPT_TAG {
        let kinds = chain.kinds();
        w.write_u32(kinds.len() as u32);
        for kind in kinds {
            w.write_u8(match kind {
                PreTransformKind::L2Normalize => 0,
            });
        }
    }
    write_header(&mut w, params.dim, ivf.ntotal(), ivf.is_trained(), params.metric, metric_arg);
    write_ivf_pq_body(
        &mut w,
        params.dim,
        ivf.coarse_quantizer(),
        ivf.product_quantizer(),
        params.by_residual,
        ivf.lists(),
        opts,
    );
    write_overlay(
        &mut w,
        ivf.default_search_params().range_search_confidence,
        params.nlist,
        ivf.lists(),
    );
    Ok(w.into_bytes())
}

/// Reads back an index previously written by [`write_index`].
///
/// # Errors
///
/// Returns [`Error::IndexCorrupted`] on a magic-tag mismatch or truncated
/// file, or propagates [`Error::Io`] if `path` cannot be opened.
pub fn read_index(path: &Path, meta: &IndexMeta, cache: Arc<BlockCache>) -> Result<Index> {
    let bytes = std::fs::read(path)?;
    let mut r = Reader::new(&bytes);
    let tag = r.peek_tag()?;

    let chain = if &tag == IXPT_TAG {
        r.expect_tag(IXPT_TAG)?;
        let count = r.read_u32()? as usize;
        let mut kinds = Vec::with_capacity(count);
        for _ in 0..count {
            kinds.push(match r.read_u8()? {
                0 => PreTransformKind::L2Normalize,
                other => {
                    return Err(Error::IndexCorrupted(format!(
                        "codec: unknown pre-transform kind tag {other}"
                    )))
                }
            });
        }
        Some(PreTransformChain::from_kinds(&kinds))
    } else if &tag == IWPQ_TAG {
        r.expect_tag(IWPQ_TAG)?;
        None
    } else {
        return Err(Error::IndexCorrupted(format!(
            "codec: unrecognized base magic tag {:?}",
            String::from_utf8_lossy(&tag)
        )));
    };

    let header = read_header(&mut r)?;

    let nlist = r.read_u32()? as usize;
    let coarse_centroids = r.read_f32_vec()?;
    let by_residual = r.read_bool()?;
    let code_size = r.read_u32()? as usize;
    let pq_dim = r.read_u32()? as usize;
    let pq_m = r.read_u32()? as usize;
    let pq_nbits = r.read_u32()?;
    let pq_centroids = r.read_f32_vec()?;

    if pq_dim != header.dim {
        return Err(Error::IndexCorrupted(format!(
            "codec: header dim {} disagrees with PQ dim {pq_dim}",
            header.dim
        )));
    }

    enum RawLists {
        Resident { codes: Vec<Vec<u8>>, ids: Vec<Vec<i64>> },
        BlockCache { block_size: u64, descriptors: Vec<ListDescriptor> },
    }

    let descriptor_tag = r.peek_tag()?;
    let raw_lists = if &descriptor_tag == ILAR_TAG {
        r.expect_tag(ILAR_TAG)?;
        let mut codes = Vec::with_capacity(nlist);
        let mut ids = Vec::with_capacity(nlist);
        for _ in 0..nlist {
            let entries = r.read_u32()? as usize;
            codes.push(r.read_raw(entries * code_size)?);
            let mut list_ids = Vec::with_capacity(entries);
            for _ in 0..entries {
                list_ids.push(r.read_i64()?);
            }
            ids.push(list_ids);
        }
        RawLists::Resident { codes, ids }
    } else if &descriptor_tag == ILBC_TAG {
        r.expect_tag(ILBC_TAG)?;
        let block_size = r.read_u64()?;
        let descriptor_nlist = r.read_u32()? as usize;
        if descriptor_nlist != nlist {
            return Err(Error::IndexCorrupted(
                "codec: ilbc descriptor nlist disagrees with coarse quantizer nlist".to_string(),
            ));
        }
        let mut descriptors = Vec::with_capacity(nlist);
        for _ in 0..nlist {
            let byte_offset = r.read_u64()?;
            let entry_count = r.read_u32()?;
            descriptors.push(ListDescriptor { byte_offset, entry_count });
        }
        // Raw codes/ids bytes for each list were interleaved into the file
        // right after the descriptor section and are read lazily via
        // pread; skip past them here to reach the overlay.
        let total_entries: u64 = descriptors.iter().map(|d| u64::from(d.entry_count)).sum();
        let raw_bytes = total_entries * (code_size as u64 + 8);
        let _ = r.read_raw(raw_bytes as usize)?;
        RawLists::BlockCache { block_size, descriptors }
    } else {
        return Err(Error::IndexCorrupted(format!(
            "codec: unrecognized inverted-list descriptor tag {:?}",
            String::from_utf8_lossy(&descriptor_tag)
        )));
    };

    let range_search_confidence = r.read_f32()?;
    let mut reconstruction_errors = Vec::with_capacity(nlist);
    for _ in 0..nlist {
        reconstruction_errors.push(r.read_f32_vec()?);
    }

    let lists: Box<dyn ListSource> = match raw_lists {
        RawLists::Resident { codes, ids } => Box::new(InMemoryInvertedLists::from_parts(
            code_size,
            codes,
            ids,
            reconstruction_errors,
        )),
        RawLists::BlockCache { block_size, descriptors } => Box::new(BlockCacheInvertedLists::open(
            path,
            code_size,
            block_size,
            descriptors,
            reconstruction_errors,
            cache,
        )?),
    };

    let build_params = IvfPqBuildParams {
        dim: header.dim,
        metric: header.metric,
        nlist,
        m: pq_m,
        nbits: pq_nbits,
        by_residual,
        min_rows_per_cluster: meta
            .optional::<i64>(crate::meta::Section::Index, "minRowsPerCluster")?
            .unwrap_or(39)
            .max(1) as usize,
        kmeans_iterations: meta
            .optional::<i64>(crate::meta::Section::Index, "kmeansIterations")?
            .unwrap_or(10)
            .max(1) as usize,
        is_vector_normed: meta.is_vector_normed()?,
    };
    let mut search_params = IvfPqSearchParams::from_meta(meta).unwrap_or(IvfPqSearchParams {
        nprobe: 1,
        max_codes: 0,
        parallel_mode: 0,
        range_search_confidence,
    });
    search_params.range_search_confidence = range_search_confidence;

    let coarse = CoarseQuantizer::from_parts(header.dim, nlist, coarse_centroids);
    let pq = ProductQuantizer::from_parts(pq_dim, pq_m, pq_nbits, pq_centroids);
    let ivf = IvfPqIndex::from_parts(build_params, search_params, coarse, pq, lists, header.ntotal);

    match chain {
        None => Ok(Index::IvfPq(ivf)),
        Some(chain) => Ok(Index::IvfPqPreTransform(IvfPqPreTransformIndex::new(
            chain,
            header.metric,
            Box::new(ivf),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use crate::meta::{IndexFamily, IndexType, Section};

    fn build_meta(nlist: i64, m: i64, nbits: i64) -> IndexMeta {
        let mut meta = IndexMeta::new(IndexFamily::Vector, IndexType::FaissIVFPQ);
        meta.set(Section::Common, "dim", 4i64);
        meta.set(Section::Common, "metric_type", Metric::L2);
        meta.set(Section::Index, "nlist", nlist);
        meta.set(Section::Index, "M", m);
        meta.set(Section::Index, "nbits", nbits);
        meta
    }

    fn trained_ivf(nlist: usize, m: usize, nbits: u32) -> IvfPqIndex {
        let params = IvfPqBuildParams {
            dim: 4,
            metric: Metric::L2,
            nlist,
            m,
            nbits,
            by_residual: true,
            min_rows_per_cluster: 1,
            kmeans_iterations: 3,
            is_vector_normed: false,
        };
        let search = IvfPqSearchParams {
            nprobe: 2,
            max_codes: 0,
            parallel_mode: 0,
            range_search_confidence: 0.75,
        };
        let mut ivf = IvfPqIndex::new(params, search);
        let rows: Vec<f32> = vec![
            0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 10.0, 10.0, 10.0, 10.0, 11.0, 11.0, 11.0, 11.0,
        ];
        ivf.train(&rows, 4);
        ivf.add_with_ids(&rows, 4, &[1, 2, 3, 4]).expect("add");
        ivf
    }

    #[test]
    fn ilar_round_trip_preserves_overlay_and_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("idx.bin");
        let ivf = trained_ivf(2, 2, 4);
        let meta = build_meta(2, 2, 4);
        let index = Index::IvfPq(ivf);
        write_index(&path, &index, &meta, WriteOptions::default()).expect("write");

        let cache = Arc::new(crate::cache::SharedCache::new(1 << 20, 1));
        let read_back = read_index(&path, &meta, cache).expect("read");
        let Index::IvfPq(ivf) = read_back else {
            panic!("expected IvfPq variant");
        };
        assert_eq!(ivf.ntotal(), 4);
        assert!((ivf.default_search_params().range_search_confidence - 0.75).abs() < 1e-6);

        let search = IvfPqSearchParams {
            nprobe: 2,
            max_codes: 0,
            parallel_mode: 0,
            range_search_confidence: 0.75,
        };
        let results = ivf.search(&[0.0, 0.0, 0.0, 0.0], 1, &search, None).expect("search");
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn ixpt_round_trip_preserves_pretransform_chain() {
        use crate::index::pretransform::{IvfPqPreTransformIndex, L2NormalizeTransform};

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("idx_cos.bin");
        let mut ivf = trained_ivf(2, 2, 4);
        ivf.train(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0], 2);
        let chain = PreTransformChain::new(vec![Box::new(L2NormalizeTransform)]);
        let wrapped = IvfPqPreTransformIndex::new(chain, Metric::CosineSimilarity, Box::new(ivf));
        let index = Index::IvfPqPreTransform(wrapped);
        let meta = build_meta(2, 2, 4);
        write_index(&path, &index, &meta, WriteOptions::default()).expect("write");

        let cache = Arc::new(crate::cache::SharedCache::new(1 << 20, 1));
        let read_back = read_index(&path, &meta, cache).expect("read");
        let Index::IvfPqPreTransform(wrapped) = read_back else {
            panic!("expected IvfPqPreTransform variant");
        };
        assert!(!wrapped.chain().is_empty());
    }
}
