/*!
 * Allocator Scenario Tests
 *
 * The same scenario battery runs against both placement policies; the
 * policies share the codec and the split/coalesce engine, so everything
 * except placement order must behave identically.
 */

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tagheap::{
    Allocator, ExplicitList, HeapAllocator, HeapConfig, MemoryError, PlacementPolicy,
    SegregatedFit,
};

fn fresh<P: PlacementPolicy + Default>() -> HeapAllocator<P> {
    HeapAllocator::with_config(HeapConfig::default()).unwrap()
}

fn reuses_freed_region_without_growth<P: PlacementPolicy + Default>() {
    let mut alloc = fresh::<P>();
    let before = alloc.stats();

    let p1 = alloc.alloc(100).unwrap();
    let _p2 = alloc.alloc(200).unwrap();
    alloc.release(Some(p1));
    let p3 = alloc.alloc(50).unwrap();

    let after = alloc.stats();
    assert_eq!(after.growth_count, 0, "placement must not extend the heap");
    assert_eq!(after.heap_bytes, before.heap_bytes);
    assert!(p3 > 0);
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_reuse_explicit() {
    reuses_freed_region_without_growth::<ExplicitList>();
}

#[test]
fn test_reuse_segregated() {
    reuses_freed_region_without_growth::<SegregatedFit>();
}

#[test]
fn test_explicit_first_fit_reuses_exact_region() {
    let mut alloc = fresh::<ExplicitList>();
    let p1 = alloc.alloc(100).unwrap();
    let p1_size = alloc.block_size(p1).unwrap();
    let _p2 = alloc.alloc(200).unwrap();
    alloc.release(Some(p1));

    // the freed block is the only listed block that fits, and the
    // allocated piece is carved from its tail
    let p3 = alloc.alloc(50).unwrap();
    let p3_size = alloc.block_size(p3).unwrap();
    assert!(p3 >= p1);
    assert!(p3 + p3_size <= p1 + p1_size);
}

#[test]
fn test_segregated_class_reuse_is_exact() {
    let mut alloc = fresh::<SegregatedFit>();
    let p = alloc.alloc(100).unwrap();
    assert_eq!(alloc.block_size(p), Some(128));
    // pin an allocated block against p so the release cannot coalesce and
    // the freed block lands on its class list
    let _guard = alloc.alloc(200).unwrap();
    alloc.release(Some(p));

    // another class-128 request pops the same block, no search, no split
    let q = alloc.alloc(120).unwrap();
    assert_eq!(q, p);
    assert!(alloc.check_heap(0).is_clean());
}

fn zero_size_alloc_round_trips<P: PlacementPolicy + Default>() {
    let mut alloc = fresh::<P>();
    let ptr = alloc.alloc(0).unwrap();
    assert!(alloc.block_size(ptr).unwrap() >= 16);
    alloc.release(Some(ptr));
    let stats = alloc.stats();
    assert_eq!(stats.free_blocks, 1);
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_zero_size_explicit() {
    zero_size_alloc_round_trips::<ExplicitList>();
}

#[test]
fn test_zero_size_segregated() {
    zero_size_alloc_round_trips::<SegregatedFit>();
}

fn adjacent_blocks_merge_in_any_order<P: PlacementPolicy + Default>() {
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let mut alloc = fresh::<P>();
        let seed_free = alloc.stats().free_bytes;

        let blocks = [
            alloc.alloc(64).unwrap(),
            alloc.alloc(64).unwrap(),
            alloc.alloc(64).unwrap(),
        ];
        for &i in &order {
            alloc.release(Some(blocks[i]));
        }

        // everything released: one free block spanning the whole region
        let stats = alloc.stats();
        assert_eq!(stats.free_blocks, 1, "release order {order:?}");
        assert_eq!(stats.free_bytes, seed_free, "release order {order:?}");
        assert_eq!(stats.allocated_blocks, 0);
        assert!(alloc.check_heap(0).is_clean(), "release order {order:?}");
    }
}

#[test]
fn test_merge_any_order_explicit() {
    adjacent_blocks_merge_in_any_order::<ExplicitList>();
}

#[test]
fn test_merge_any_order_segregated() {
    adjacent_blocks_merge_in_any_order::<SegregatedFit>();
}

fn realloc_preserves_payload<P: PlacementPolicy + Default>() {
    let mut alloc = fresh::<P>();
    let p = alloc.alloc(100).unwrap();
    let pattern: Vec<u8> = (0..100).map(|i| i as u8).collect();
    alloc.payload_mut(p).unwrap()[..100].copy_from_slice(&pattern);

    // grow: the first 100 bytes survive the move byte for byte
    let q = alloc.reallocate(Some(p), 300).unwrap().unwrap();
    assert_eq!(&alloc.payload(q).unwrap()[..100], &pattern[..]);
    assert!(alloc.payload(p).is_err(), "old block must be released");

    // shrink: the first 40 bytes survive
    let r = alloc.reallocate(Some(q), 40).unwrap().unwrap();
    assert_eq!(&alloc.payload(r).unwrap()[..40], &pattern[..40]);
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_realloc_explicit() {
    realloc_preserves_payload::<ExplicitList>();
}

#[test]
fn test_realloc_segregated() {
    realloc_preserves_payload::<SegregatedFit>();
}

fn realloc_edge_cases<P: PlacementPolicy + Default>() {
    let mut alloc = fresh::<P>();

    // nil target acts as a plain alloc
    let p = alloc.reallocate(None, 64).unwrap().unwrap();
    assert!(alloc.block_size(p).is_some());

    // zero size releases and returns nothing
    assert_eq!(alloc.reallocate(Some(p), 0).unwrap(), None);
    assert!(alloc.payload(p).is_err());
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_realloc_edges_explicit() {
    realloc_edge_cases::<ExplicitList>();
}

#[test]
fn test_realloc_edges_segregated() {
    realloc_edge_cases::<SegregatedFit>();
}

fn calloc_zeroes_recycled_memory<P: PlacementPolicy + Default>() {
    let mut alloc = fresh::<P>();
    // dirty a block, free it, then calloc over the recycled region
    let p = alloc.alloc(64).unwrap();
    alloc.payload_mut(p).unwrap().fill(0xAB);
    alloc.release(Some(p));

    let q = alloc.alloc_zeroed(16, 4).unwrap();
    assert!(alloc.payload(q).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn test_calloc_explicit() {
    calloc_zeroes_recycled_memory::<ExplicitList>();
}

#[test]
fn test_calloc_segregated() {
    calloc_zeroes_recycled_memory::<SegregatedFit>();
}

fn exhaustion_triggers_one_growth<P: PlacementPolicy + Default>() {
    let mut alloc = fresh::<P>();
    let initial = alloc.stats().heap_bytes;

    let mut rounds = 0;
    while alloc.stats().growth_count == 0 {
        alloc.alloc(256).unwrap();
        rounds += 1;
        assert!(rounds < 100, "heap never filled up");
    }
    let stats = alloc.stats();
    assert_eq!(stats.growth_count, 1);
    // the extension covers at least the request that triggered it
    assert!(stats.heap_bytes >= initial + 256);
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_growth_explicit() {
    exhaustion_triggers_one_growth::<ExplicitList>();
}

#[test]
fn test_growth_segregated() {
    exhaustion_triggers_one_growth::<SegregatedFit>();
}

fn oom_is_clean_and_recoverable<P: PlacementPolicy + Default>() {
    let mut alloc: HeapAllocator<P> =
        HeapAllocator::with_config(HeapConfig::small(256, 1024)).unwrap();

    let err = alloc.alloc(10_000).unwrap_err();
    assert!(matches!(err, MemoryError::OutOfMemory { .. }));

    // the failure corrupted nothing and smaller requests still work
    assert!(alloc.check_heap(0).is_clean());
    let p = alloc.alloc(64).unwrap();
    alloc.release(Some(p));
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_oom_explicit() {
    oom_is_clean_and_recoverable::<ExplicitList>();
}

#[test]
fn test_oom_segregated() {
    oom_is_clean_and_recoverable::<SegregatedFit>();
}

#[test]
fn test_allocation_surface_is_policy_agnostic() {
    let mut explicit = fresh::<ExplicitList>();
    let mut segregated = fresh::<SegregatedFit>();
    let allocators: [&mut dyn Allocator; 2] = [&mut explicit, &mut segregated];
    for alloc in allocators {
        let p = alloc.alloc(32).unwrap();
        let q = alloc.reallocate(Some(p), 64).unwrap();
        assert!(q.is_some());
        let z = alloc.alloc_zeroed(4, 8).unwrap();
        alloc.release(q);
        alloc.release(Some(z));
        alloc.release(None);
    }
}

/// Randomized alloc/release interleaving: live payloads never overlap and
/// their contents survive every other operation.
fn random_interleaving_keeps_blocks_disjoint<P: PlacementPolicy + Default>(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut alloc: HeapAllocator<P> =
        HeapAllocator::with_config(HeapConfig::small(1024, 1 << 20)).unwrap();
    let mut live: Vec<(usize, u8, usize)> = Vec::new();

    for round in 0..2000 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let want = rng.gen_range(0..400);
            let fill = (round % 251) as u8;
            if let Ok(ptr) = alloc.alloc(want) {
                alloc.payload_mut(ptr).unwrap()[..want].fill(fill);
                live.push((ptr, fill, want));
            }
        } else {
            let victim = rng.gen_range(0..live.len());
            let (ptr, fill, len) = live.swap_remove(victim);
            assert!(alloc.payload(ptr).unwrap()[..len].iter().all(|&b| b == fill));
            alloc.release(Some(ptr));
        }

        if round % 250 == 0 {
            assert!(alloc.check_heap(0).is_clean(), "round {round}");
        }
    }

    // every requested span is covered and pairwise disjoint
    let mut spans: Vec<(usize, usize)> = live
        .iter()
        .map(|&(ptr, _, _)| (ptr, alloc.block_size(ptr).unwrap()))
        .collect();
    spans.sort_unstable();
    for pair in spans.windows(2) {
        let (a, a_size) = pair[0];
        let (b, _) = pair[1];
        assert!(a + a_size <= b, "payloads overlap: {pair:?}");
    }

    for (ptr, fill, len) in live {
        assert!(alloc.payload(ptr).unwrap()[..len].iter().all(|&b| b == fill));
        alloc.release(Some(ptr));
    }
    // full release collapses the heap back to one free block
    let stats = alloc.stats();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.allocated_blocks, 0);
    assert!(alloc.check_heap(0).is_clean());
}

#[test]
fn test_random_interleaving_explicit() {
    random_interleaving_keeps_blocks_disjoint::<ExplicitList>(0x7461676865617031);
}

#[test]
fn test_random_interleaving_segregated() {
    random_interleaving_keeps_blocks_disjoint::<SegregatedFit>(0x7461676865617032);
}
