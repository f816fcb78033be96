use super::*;

#[test]
fn rent_rounds_capacity_up() {
    let pool = BufferPool::<u32>::default();
    let buf = pool.rent(5);
    assert!(buf.capacity() >= 8);
    assert!(buf.is_empty());
}

#[test]
fn returned_buffer_is_reused() {
    let pool = BufferPool::<u32>::default();
    let mut buf = pool.rent(4);
    buf.extend([1, 2, 3]);
    pool.give_back(buf);

    let again = pool.rent(3);
    assert!(again.is_empty());
    let st = pool.stats();
    assert_eq!(st.allocated, 1);
    assert_eq!(st.rented, 2);
    assert_eq!(st.outstanding(), 1);
}

#[test]
fn larger_idle_buffer_satisfies_smaller_request() {
    let pool = BufferPool::<u8>::default();
    pool.give_back(Vec::with_capacity(64));
    let buf = pool.rent(10);
    assert!(buf.capacity() >= 64);
    assert_eq!(pool.stats().allocated, 0);
}

#[test]
fn pool_honors_bucket_cap() {
    let pool = BufferPool::<u8>::new(PoolOpts {
        max_buffers_per_bucket: 1,
        max_retained_elements: 1 << 20,
    });
    let a = pool.rent(8);
    let b = pool.rent(8);
    pool.give_back(a);
    pool.give_back(b);

    let st = pool.stats();
    assert_eq!(st.retained_buffers, 1);
    assert_eq!(st.dropped_on_return, 1);
    assert_eq!(st.outstanding(), 0);
}

#[test]
fn pool_honors_element_cap() {
    let pool = BufferPool::<u8>::new(PoolOpts {
        max_buffers_per_bucket: 8,
        max_retained_elements: 8,
    });
    pool.give_back(Vec::with_capacity(8));
    pool.give_back(Vec::with_capacity(8));
    let st = pool.stats();
    assert_eq!(st.retained_buffers, 1);
    assert!(st.retained_elements <= 8);
}

#[test]
fn give_back_drops_contents() {
    use std::sync::Arc;

    let pool = BufferPool::<Arc<()>>::default();
    let item = Arc::new(());
    let mut buf = pool.rent(2);
    buf.push(item.clone());
    pool.give_back(buf);
    assert_eq!(Arc::strong_count(&item), 1);
}
