//! Lock-guarded map and list with snapshot iteration.
//!
//! Both containers use a re-entrant lock so that code already holding
//! the lock (e.g. a shutdown handler invoked mid-operation) can call
//! back in without deadlocking. Iteration always walks a snapshot copy,
//! never the live container.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::ReentrantMutex;

/// Thread-safe map for shared state.
pub struct ThreadSafeMap<K, V> {
    inner: ReentrantMutex<RefCell<HashMap<K, V>>>,
}

impl<K, V> ThreadSafeMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    /// Atomic get, returning a clone of the value.
    pub fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock();
        let value = guard.borrow().get(key).cloned();
        value
    }

    /// Atomic insert. Returns the previous value if one existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let guard = self.inner.lock();
        let previous = guard.borrow_mut().insert(key, value);
        previous
    }

    /// Atomic delete. Returns true if the key existed.
    pub fn remove(&self, key: &K) -> bool {
        let guard = self.inner.lock();
        let removed = guard.borrow_mut().remove(key).is_some();
        removed
    }

    /// Atomic bulk update, merging `entries` into the map.
    pub fn extend(&self, entries: HashMap<K, V>) {
        let guard = self.inner.lock();
        guard.borrow_mut().extend(entries);
    }

    /// Mutate a single entry in place. Returns true if the key existed.
    pub fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        let guard = self.inner.lock();
        let mut map = guard.borrow_mut();
        match map.get_mut(key) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }

    /// Snapshot copy of the whole map.
    pub fn snapshot(&self) -> HashMap<K, V> {
        let guard = self.inner.lock();
        let copy = guard.borrow().clone();
        copy
    }

    /// Snapshot copy of the keys.
    pub fn keys(&self) -> Vec<K> {
        let guard = self.inner.lock();
        let keys = guard.borrow().keys().cloned().collect();
        keys
    }

    pub fn contains_key(&self, key: &K) -> bool {
        let guard = self.inner.lock();
        let contains = guard.borrow().contains_key(key);
        contains
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        let len = guard.borrow().len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a multi-step sequence while holding the lock.
    ///
    /// The lock is re-entrant, so `f` may call any other method on the
    /// same container (directly or through a callback) without
    /// deadlocking; no other thread can interleave until `f` returns.
    pub fn atomic<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.inner.lock();
        f(self)
    }
}

impl<K, V> Default for ThreadSafeMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe list for task tracking.
pub struct ThreadSafeList<T> {
    inner: ReentrantMutex<RefCell<Vec<T>>>,
}

impl<T: Clone> ThreadSafeList<T> {
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn push(&self, item: T) {
        let guard = self.inner.lock();
        guard.borrow_mut().push(item);
    }

    pub fn pop(&self) -> Option<T> {
        let guard = self.inner.lock();
        let item = guard.borrow_mut().pop();
        item
    }

    pub fn clear(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().clear();
    }

    /// Snapshot copy of the list contents.
    pub fn snapshot(&self) -> Vec<T> {
        let guard = self.inner.lock();
        let copy = guard.borrow().clone();
        copy
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        let len = guard.borrow().len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a multi-step sequence while holding the lock.
    ///
    /// As with [`ThreadSafeMap::atomic`], `f` may re-enter the container.
    pub fn atomic<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.inner.lock();
        f(self)
    }
}

impl<T: Clone + PartialEq> ThreadSafeList<T> {
    /// Remove the first occurrence of `item`. Returns true if found.
    pub fn remove_item(&self, item: &T) -> bool {
        let guard = self.inner.lock();
        let mut list = guard.borrow_mut();
        match list.iter().position(|x| x == item) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        let guard = self.inner.lock();
        let contains = guard.borrow().contains(item);
        contains
    }
}

impl<T: Clone> Default for ThreadSafeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn map_basic_operations() {
        let map: ThreadSafeMap<String, u32> = ThreadSafeMap::new();
        assert!(map.is_empty());

        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"a".to_string()), Some(1));

        assert!(map.remove(&"a".to_string()));
        assert!(!map.remove(&"a".to_string()));
        assert!(!map.contains_key(&"a".to_string()));
    }

    #[test]
    fn map_update_mutates_in_place() {
        let map: ThreadSafeMap<String, u32> = ThreadSafeMap::new();
        map.insert("n".to_string(), 1);

        assert!(map.update(&"n".to_string(), |v| *v += 10));
        assert_eq!(map.get(&"n".to_string()), Some(11));
        assert!(!map.update(&"missing".to_string(), |v| *v += 1));
    }

    #[test]
    fn map_snapshot_is_independent_copy() {
        let map: ThreadSafeMap<String, u32> = ThreadSafeMap::new();
        map.insert("a".to_string(), 1);

        let snapshot = map.snapshot();
        map.insert("b".to_string(), 2);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn map_atomic_is_reentrant() {
        let map = Arc::new(ThreadSafeMap::<String, u32>::new());
        map.insert("x".to_string(), 1);

        let inner = map.clone();
        let value = map.atomic(|m| {
            m.insert("y".to_string(), 2);
            // Re-enter the lock through another handle to the same map.
            inner.get(&"x".to_string())
        });

        assert_eq!(value, Some(1));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn map_concurrent_inserts() {
        let map = Arc::new(ThreadSafeMap::<u32, u32>::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let map = map.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        map.insert(i * 100 + j, j);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 800);
    }

    #[test]
    fn list_basic_operations() {
        let list: ThreadSafeList<u32> = ThreadSafeList::new();
        list.push(1);
        list.push(2);
        list.push(3);

        assert_eq!(list.len(), 3);
        assert!(list.contains(&2));
        assert!(list.remove_item(&2));
        assert!(!list.remove_item(&2));
        assert_eq!(list.pop(), Some(3));
        assert_eq!(list.snapshot(), vec![1]);

        list.clear();
        assert!(list.is_empty());
    }
}
