use super::*;

#[test]
fn default_block_cache_is_a_singleton() {
    let a = default_block_cache();
    let b = default_block_cache();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn default_index_cache_is_a_singleton() {
    let a = default_index_cache();
    let b = default_index_cache();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn default_block_cache_accepts_inserts() {
    let key = BlockKey {
        file_key: 0xDEAD_BEEF,
        list_no: 3,
    };
    default_block_cache().insert(key, vec![1, 2, 3], CachePriority::Normal);
    assert!(default_block_cache().get(&key).is_some());
}
