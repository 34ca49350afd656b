//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the memory store, the coordinator, the key codec
//! and the rate limiter against simple models. Async pieces are driven
//! through `tokio_test::block_on`.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    CacheCoordinator, CacheKey, EvictionPolicy, InMemoryTier, MemoryStore, PersistentTier,
    SqliteTier, Tier,
};
use crate::clock::{Clock, ManualClock};
use crate::limiter::{EndpointClass, RateLimitConfig, RateLimiter};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const HOUR: Duration = Duration::from_secs(3600);

// == Strategies ==
fn video_id_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{11}"
}

fn lang_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("en".to_string()), Just("fr".to_string()), "[a-z]{2}(-[A-Z]{2})?"]
}

fn format_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("json"), Just("vtt"), Just("text")]
}

fn payload_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}"
}

fn key_strategy() -> impl Strategy<Value = CacheKey> {
    (video_id_strategy(), lang_strategy(), format_strategy())
        .prop_map(|(id, lang, format)| CacheKey::derive(&id, &lang, format))
}

#[derive(Debug, Clone)]
enum StoreOp {
    Set { key: u8, value: String },
    Get { key: u8 },
    Remove { key: u8 },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    // A small key space so operations actually collide.
    prop_oneof![
        (0u8..16, payload_strategy()).prop_map(|(key, value)| StoreOp::Set { key, value }),
        (0u8..16).prop_map(|key| StoreOp::Get { key }),
        (0u8..16).prop_map(|key| StoreOp::Remove { key }),
    ]
}

struct CoordinatorFixture {
    clock: Arc<ManualClock>,
    coordinator: CacheCoordinator,
}

fn coordinator_fixture() -> CoordinatorFixture {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let memory = Arc::new(InMemoryTier::new(
        TEST_MAX_ENTRIES,
        EvictionPolicy::Fifo,
        dyn_clock.clone(),
    ));
    let persistent = SqliteTier::in_memory()
        .ok()
        .map(|tier| Arc::new(tier) as Arc<dyn PersistentTier>);

    CoordinatorFixture {
        clock,
        coordinator: CacheCoordinator::new(memory, persistent, dyn_clock, HOUR),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Property 1: Statistics Accuracy
    // *For any* sequence of store operations on an uncapped store, hits and
    // misses match a plain map model.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut store = MemoryStore::new(TEST_MAX_ENTRIES, EvictionPolicy::Fifo);
        let mut model: HashMap<u8, String> = HashMap::new();
        let (mut hits, mut misses) = (0u64, 0u64);

        for op in ops {
            match op {
                StoreOp::Set { key, value } => {
                    store.set(CacheKey::from_raw(key.to_string()), value.clone(), 0, HOUR);
                    model.insert(key, value);
                }
                StoreOp::Get { key } => {
                    let got = store.get(&CacheKey::from_raw(key.to_string()), 0);
                    prop_assert_eq!(got.as_ref(), model.get(&key));
                    if got.is_some() { hits += 1 } else { misses += 1 }
                }
                StoreOp::Remove { key } => {
                    store.remove(&CacheKey::from_raw(key.to_string()));
                    model.remove(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);
        prop_assert_eq!(stats.evictions, 0);
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // Property 2: Capacity Enforcement
    // *For any* capacity and insertion count, the store never exceeds its
    // capacity and evicts exactly one entry per insertion over the limit.
    #[test]
    fn prop_capacity_enforcement(capacity in 1usize..20, inserts in 0usize..60) {
        let mut store = MemoryStore::new(capacity, EvictionPolicy::Fifo);

        for i in 0..inserts {
            store.set(CacheKey::from_raw(format!("k{i}")), "v".into(), 0, HOUR);
            prop_assert!(store.len() <= capacity);
        }

        prop_assert_eq!(store.len(), inserts.min(capacity));
        prop_assert_eq!(store.stats().evictions, inserts.saturating_sub(capacity) as u64);
    }

    // Property 3: Overwrite Never Evicts
    // *For any* full store, rewriting a resident key keeps every other entry.
    #[test]
    fn prop_overwrite_never_evicts(capacity in 1usize..20, victim in 0usize..20, value in payload_strategy()) {
        let victim = victim % capacity;
        let mut store = MemoryStore::new(capacity, EvictionPolicy::Fifo);
        for i in 0..capacity {
            store.set(CacheKey::from_raw(format!("k{i}")), "v".into(), 0, HOUR);
        }

        let displaced = store.set(CacheKey::from_raw(format!("k{victim}")), value.clone(), 0, HOUR);

        prop_assert!(displaced.is_none());
        prop_assert_eq!(store.len(), capacity);
        prop_assert_eq!(store.get(&CacheKey::from_raw(format!("k{victim}")), 0), Some(value));
    }

    // Property 4: Key Determinism
    // *For any* identity, deriving twice yields the same key, and distinct
    // identities yield distinct keys.
    #[test]
    fn prop_key_determinism(
        a in (video_id_strategy(), lang_strategy(), format_strategy()),
        b in (video_id_strategy(), lang_strategy(), format_strategy()),
    ) {
        let ka = CacheKey::derive(&a.0, &a.1, a.2);
        prop_assert_eq!(&ka, &CacheKey::derive(&a.0, &a.1, a.2));

        let kb = CacheKey::derive(&b.0, &b.1, b.2);
        prop_assert_eq!(ka == kb, a == b);
    }

    // Property 5: Component Boundaries
    // *For any* split point, moving characters between components changes the key.
    #[test]
    fn prop_key_component_boundaries(s in "[a-z:]{2,20}", split in 1usize..19) {
        let split = split.min(s.len() - 1);
        let (left, right) = s.split_at(split);
        prop_assert_ne!(
            CacheKey::derive(left, right, "json"),
            CacheKey::derive(&s, "", "json")
        );
    }

    // Property 6: Store Then Lookup
    // *For any* key, a store followed by a lookup is an L1 hit with the stored value.
    #[test]
    fn prop_store_then_lookup_hits_l1(key in key_strategy(), value in payload_strategy()) {
        let fx = coordinator_fixture();
        tokio_test::block_on(async {
            fx.coordinator.store(&key, value.clone(), None).await;
            let lookup = fx.coordinator.lookup(&key).await;
            prop_assert_eq!(lookup.tier(), Some(Tier::L1));
            prop_assert_eq!(lookup.value(), Some(value.as_str()));
            Ok(())
        })?;
    }

    // Property 7: Promotion
    // *For any* key still in L2 after L1 is cleared, the next lookup is an
    // L2 hit and the one after is an L1 hit.
    #[test]
    fn prop_promotion_after_l1_clear(key in key_strategy(), value in payload_strategy()) {
        let fx = coordinator_fixture();
        tokio_test::block_on(async {
            fx.coordinator.store(&key, value.clone(), None).await;
            fx.coordinator.clear_memory().await;

            let first = fx.coordinator.lookup(&key).await;
            prop_assert_eq!(first.tier(), Some(Tier::L2));
            prop_assert_eq!(first.value(), Some(value.as_str()));

            let second = fx.coordinator.lookup(&key).await;
            prop_assert_eq!(second.tier(), Some(Tier::L1));
            Ok(())
        })?;
    }

    // Property 8: Expiry
    // *For any* TTL, a lookup at or after the expiry misses in both tiers,
    // whether or not the raw records were swept.
    #[test]
    fn prop_expired_lookup_misses(
        key in key_strategy(),
        ttl_ms in 1u64..10_000,
        late_by in 0u64..10_000,
    ) {
        let fx = coordinator_fixture();
        tokio_test::block_on(async {
            fx.coordinator.store(&key, "payload".into(), Some(Duration::from_millis(ttl_ms))).await;
            fx.clock.advance(Duration::from_millis(ttl_ms + late_by));
            prop_assert!(fx.coordinator.lookup(&key).await.is_miss());
            Ok(())
        })?;
    }

    // Property 9: Limiter Ceiling
    // *For any* ceiling and burst, exactly min(burst, ceiling) requests are
    // admitted inside one window, and the next window starts fresh.
    #[test]
    fn prop_limiter_ceiling(ceiling in 0u32..20, burst in 0u32..40) {
        let clock = Arc::new(ManualClock::new(0));
        let config = RateLimitConfig {
            enabled: true,
            window: Duration::from_secs(60),
            per_window: ceiling,
            batch_per_window: ceiling,
            max_tracked_clients: 16,
        };
        let limiter = RateLimiter::new(config, clock.clone());

        tokio_test::block_on(async {
            let mut admitted = 0;
            for _ in 0..burst {
                if limiter.admit("client", EndpointClass::Subtitles).await {
                    admitted += 1;
                }
            }
            prop_assert_eq!(admitted, burst.min(ceiling));

            clock.advance(Duration::from_secs(60));
            prop_assert_eq!(
                limiter.admit("client", EndpointClass::Subtitles).await,
                ceiling > 0
            );
            Ok(())
        })?;
    }

    // Property 10: Bounded Client Table
    // *For any* set of client identities, tracked windows never exceed the cap.
    #[test]
    fn prop_limiter_table_bounded(clients in prop::collection::vec("[a-f0-9]{1,8}", 1..80)) {
        let clock = Arc::new(ManualClock::new(0));
        let config = RateLimitConfig {
            max_tracked_clients: 10,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config, clock);
        let distinct: HashSet<_> = clients.iter().cloned().collect();

        let stats = tokio_test::block_on(async {
            for client in &clients {
                limiter.admit(client, EndpointClass::Subtitles).await;
            }
            limiter.stats().await
        });

        prop_assert_eq!(stats.tracked_windows, distinct.len().min(10));
    }
}
