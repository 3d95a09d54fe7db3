//! 크기 제한 캐시 -- 삽입 순서 기반 축출
//!
//! [`BoundedCache`]는 라우트, 경로 해석, 템플릿 해석 캐시가 공통으로 쓰는
//! 트리밍 정책입니다. 용량을 넘으면 가장 먼저 삽입된 엔트리부터 제거합니다.
//! 접근 순서는 추적하지 않으므로 엄밀한 LRU가 아닙니다.
//!
//! 모든 연산은 O(1)(상각)이며, 어떤 변경 이후에도 `len() <= capacity()`가 성립합니다.

use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// 삽입 순서 기반 크기 제한 캐시
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// 키 -> 값
    entries: HashMap<K, V>,
    /// 삽입 순서 (앞쪽이 가장 오래됨)
    order: VecDeque<K>,
    /// 최대 엔트리 수
    capacity: usize,
    /// 축출된 엔트리 수 (통계용)
    evicted: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// 새 캐시를 생성합니다. 용량 0은 1로 올려 잡습니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    /// 값을 조회합니다. 조회는 삽입 순서에 영향을 주지 않습니다.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key)
    }

    /// 키 존재 여부
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// 값을 삽입합니다.
    ///
    /// 이미 있는 키는 값만 갱신하고 삽입 순서는 유지합니다.
    /// 용량을 넘으면 가장 오래된 엔트리부터 제거합니다.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        self.trim();
    }

    /// 모든 엔트리를 제거하고 축출 카운터를 초기화합니다.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.evicted = 0;
    }

    /// 현재 엔트리 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 최대 엔트리 수
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 마지막 `clear` 이후 축출된 엔트리 수
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.evicted += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_inserted() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        // 조회는 순서를 바꾸지 않음
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.insert("c", 3);

        assert!(!cache.contains(&"a"));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.evicted(), 1);
    }

    #[test]
    fn reinsert_updates_value_without_reordering() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);

        // "a"는 여전히 가장 오래된 엔트리
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_resets_entries_and_evictions() {
        let mut cache = BoundedCache::new(1);
        cache.insert(1, "one");
        cache.insert(2, "two");
        assert_eq!(cache.evicted(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.evicted(), 0);
    }

    #[test]
    fn lookup_by_borrowed_key() {
        let mut cache: BoundedCache<String, u32> = BoundedCache::new(2);
        cache.insert("route".to_owned(), 7);
        assert_eq!(cache.get("route"), Some(&7));
        assert!(!cache.contains("other"));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut cache = BoundedCache::new(0);
        cache.insert(1, 1);
        cache.insert(2, 2);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(capacity in 1usize..64, extra in 0usize..128) {
            let mut cache = BoundedCache::new(capacity);
            for i in 0..capacity + extra {
                cache.insert(i, i);
                prop_assert!(cache.len() <= capacity);
            }
            prop_assert_eq!(cache.len(), capacity);
        }

        #[test]
        fn newest_entries_survive(capacity in 1usize..32, extra in 0usize..64) {
            let mut cache = BoundedCache::new(capacity);
            let total = capacity + extra;
            for i in 0..total {
                cache.insert(i, i);
            }
            for i in (total - capacity)..total {
                prop_assert!(cache.contains(&i));
            }
        }
    }
}
