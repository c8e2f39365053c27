use snapcache::{CacheHandle, ObjectCache, SharedSnapshot, SnapshotHandle};

#[derive(Debug, Clone)]
enum Op {
    Read,
    Push(u8),
    Pop,
    Refuse(u8),
    Replace(Vec<u8>),
    Release(proptest::sample::Index),
}

fn op() -> impl proptest::strategy::Strategy<Value = Op> {
    use proptest::prelude::*;
    prop_oneof![
        Just(Op::Read),
        any::<u8>().prop_map(Op::Push),
        Just(Op::Pop),
        any::<u8>().prop_map(Op::Refuse),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Op::Replace),
        any::<proptest::sample::Index>().prop_map(Op::Release),
    ]
}

proptest::proptest! {
    #[test]
    fn snapshot_handles_are_isolated(ops in proptest::collection::vec(op(), 1..64)) {
        let snap = SharedSnapshot::new(Vec::<u8>::new());
        let mut model: Vec<u8> = Vec::new();
        // Every handle handed out, with the value it saw when taken.
        let mut held: Vec<(SnapshotHandle<Vec<u8>>, Vec<u8>)> = Vec::new();

        for op in ops {
            match op {
                Op::Read => {
                    let h = snap.read();
                    proptest::prop_assert_eq!(&*h, &model);
                    held.push((h, model.clone()));
                }
                Op::Push(b) => {
                    let before = SnapshotHandle::as_ptr(&snap.read());
                    let shared = held
                        .iter()
                        .any(|(h, _)| SnapshotHandle::as_ptr(h) == before);
                    snap.mutate(|v| v.push(b));
                    model.push(b);
                    let after = SnapshotHandle::as_ptr(&snap.read());
                    if shared {
                        proptest::prop_assert_ne!(before, after);
                    } else {
                        proptest::prop_assert_eq!(before, after);
                    }
                }
                Op::Pop => {
                    let popped = snap.mutate(|v| v.pop());
                    proptest::prop_assert_eq!(popped, model.pop());
                }
                Op::Refuse(b) => {
                    let r: Result<(), u8> = snap.try_mutate(|v| {
                        v.push(b);
                        Err(b)
                    });
                    proptest::prop_assert_eq!(r, Err(b));
                }
                Op::Replace(v) => {
                    let prev = snap.replace(v.clone());
                    proptest::prop_assert_eq!(&*prev, &model);
                    model = v;
                }
                Op::Release(idx) => {
                    if !held.is_empty() {
                        let i = idx.index(held.len());
                        held.swap_remove(i);
                    }
                }
            }

            proptest::prop_assert_eq!(&*snap.read(), &model);
            for (h, seen) in held.iter() {
                proptest::prop_assert_eq!(&**h, seen);
            }
        }
    }

    #[test]
    fn pool_registry_bounded_by_live_keys(
        keys in proptest::collection::vec(0u8..8, 1..128),
        keep in proptest::collection::vec(proptest::bool::ANY, 1..128),
    ) {
        let pool = ObjectCache::from_fn(|k: &u8| u32::from(*k) * 3);
        let mut live: Vec<CacheHandle<u8, u32>> = Vec::new();

        for (i, k) in keys.iter().enumerate() {
            let h = pool.fetch(k);
            proptest::prop_assert_eq!(*h, u32::from(*k) * 3);
            if let Some(other) = live.iter().find(|o| o.key() == k) {
                proptest::prop_assert!(CacheHandle::ptr_eq(other, &h));
            }
            if keep[i % keep.len()] {
                live.push(h);
            } else {
                drop(h);
            }

            let mut distinct: Vec<u8> = live.iter().map(|h| *h.key()).collect();
            distinct.sort_unstable();
            distinct.dedup();
            proptest::prop_assert_eq!(pool.len(), distinct.len());
        }

        drop(live);
        proptest::prop_assert!(pool.is_empty());
    }
}
