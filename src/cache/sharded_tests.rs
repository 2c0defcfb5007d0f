use super::*;

#[test]
fn insert_and_get_round_trips() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(1024, 4);
    cache.insert(1, vec![0u8; 10], CachePriority::Normal);
    let got = cache.get(&1).expect("present");
    assert_eq!(got.len(), 10);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn miss_increments_counter() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(1024, 4);
    assert!(cache.get(&99).is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn eviction_respects_capacity() {
    // 1 shard, 100 bytes, so only ~10 entries of 10 bytes fit.
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(100, 1);
    for i in 0..20u32 {
        cache.insert(i, vec![0u8; 10], CachePriority::Normal);
    }
    assert!(cache.memory_usage() <= 100);
    assert!(cache.len() <= 10);
    assert!(cache.stats().evictions > 0);
    // Most recently inserted entries should have survived.
    assert!(cache.get(&19).is_some());
}

#[test]
fn durable_entries_survive_normal_eviction() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(50, 1);
    cache.insert(0, vec![0u8; 10], CachePriority::Durable);
    for i in 1..10u32 {
        cache.insert(i, vec![0u8; 10], CachePriority::Normal);
    }
    assert!(cache.get(&0).is_some(), "durable entry should survive");
}

#[test]
fn remove_frees_capacity() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(1024, 1);
    cache.insert(1, vec![0u8; 100], CachePriority::Normal);
    assert_eq!(cache.memory_usage(), 100);
    cache.remove(&1);
    assert_eq!(cache.memory_usage(), 0);
}

#[test]
fn set_capacity_redistributes_per_shard() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(400, 4);
    assert_eq!(cache.capacity(), 400);
    cache.set_capacity(800);
    assert_eq!(cache.capacity(), 800);
}

#[test]
fn adjust_capacity_refuses_to_shrink_below_minimum() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(400, 1);
    let applied = cache.adjust_capacity(-1000, 100);
    assert_eq!(applied, 100);
    assert_eq!(cache.capacity(), 100);
}

#[test]
fn adjust_capacity_grows_normally() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(400, 1);
    let applied = cache.adjust_capacity(100, 0);
    assert_eq!(applied, 500);
}

#[test]
fn status_json_reports_per_shard_and_lookup_counters() {
    let cache: SharedCache<u32, Vec<u8>> = SharedCache::new(1024, 2);
    cache.insert(1, vec![0u8; 10], CachePriority::Normal);
    cache.get(&1);
    cache.get(&2);
    let status = cache.status_json();
    assert_eq!(status["lookup_count"], 2);
    assert_eq!(status["hit_count"], 1);
    assert_eq!(status["shards"].as_array().expect("shards array").len(), 2);
}
