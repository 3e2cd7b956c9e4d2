use std::collections::VecDeque;

#[derive(Debug, Eq, PartialEq)]
pub struct QueueItem<K, V> {
    pub key: K,
    pub value: V,
}

/// A round-robin queue keyed by requester. Each key owns a FIFO of values, and popping takes
/// one value from each key in turn so no single requester can hog the queue.
///
///   Input: (a, 1), (a, 2), (b, 1), (c, 1), (a, 3), (b, 2)
///   Output: (a, 1), (b, 1), (c, 1), (a, 2), (b, 2), (a, 3)
///
/// The front of the queue is the item currently playing.
#[derive(Clone, Debug)]
pub struct MusicQueue<K, V> {
    buckets: VecDeque<(K, VecDeque<V>)>,
}

impl<K, V> Default for MusicQueue<K, V> {
    fn default() -> Self {
        Self {
            buckets: VecDeque::new(),
        }
    }
}

impl<K, V> MusicQueue<K, V>
where
    K: Copy + Eq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends values to the end of a key's queue, creating it at the back of the rotation if
    /// the key has nothing queued.
    pub fn extend(&mut self, key: K, values: impl IntoIterator<Item = V>) {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return;
        }
        match self.buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bucket)) => bucket.extend(values),
            None => self.buckets.push_back((key, values.collect())),
        }
    }

    pub fn push(&mut self, key: K, value: V) {
        self.extend(key, std::iter::once(value));
    }

    pub fn peek(&self) -> Option<QueueItem<K, &V>> {
        let (key, bucket) = self.buckets.front()?;
        Some(QueueItem {
            key: *key,
            value: bucket.front()?,
        })
    }

    /// Removes the front item and moves its key to the back of the rotation.
    pub fn pop(&mut self) -> Option<QueueItem<K, V>> {
        let (key, mut bucket) = self.buckets.pop_front()?;
        let value = bucket.pop_front()?;
        if !bucket.is_empty() {
            self.buckets.push_back((key, bucket));
        }
        Some(QueueItem { key, value })
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|(_, bucket)| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn count(&self, key: K) -> Option<usize> {
        self.buckets
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, bucket)| bucket.len())
    }

    pub fn clear(&mut self) {
        self.buckets.clear()
    }

    /// Iterates in play order.
    pub fn iter(&self) -> impl Iterator<Item = QueueItem<K, &V>> + '_ {
        let rounds = self
            .buckets
            .iter()
            .map(|(_, bucket)| bucket.len())
            .max()
            .unwrap_or(0);
        (0..rounds).flat_map(move |round| {
            self.buckets.iter().filter_map(move |(key, bucket)| {
                bucket.get(round).map(|value| QueueItem { key: *key, value })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MusicQueue, QueueItem};

    fn sample() -> MusicQueue<u64, u64> {
        let mut queue = MusicQueue::new();
        queue.push(20, 20);
        queue.push(10, 10);
        queue.push(5, 30);
        queue.push(10, 15);
        queue.push(20, 40);
        queue.push(20, 60);
        queue
    }

    #[test]
    fn test_empty_queue() {
        let mut queue: MusicQueue<u64, u64> = MusicQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.peek(), None);
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_extend_with_nothing_adds_no_key() {
        let mut queue: MusicQueue<u64, u64> = MusicQueue::new();
        queue.extend(20, Vec::new());
        assert!(queue.is_empty());
        assert_eq!(queue.count(20), None);
    }

    #[test]
    fn test_pop_round_robin() {
        let mut queue = sample();
        assert_eq!(queue.len(), 6);
        let order: Vec<(u64, u64)> = std::iter::from_fn(|| queue.pop())
            .map(|item| (item.key, item.value))
            .collect();
        assert_eq!(
            order,
            vec![(20, 20), (10, 10), (5, 30), (20, 40), (10, 15), (20, 60)]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_counts_track_pops() {
        let mut queue = sample();
        assert_eq!(queue.count(20), Some(3));
        queue.pop();
        assert_eq!(queue.count(20), Some(2));
        queue.pop();
        queue.pop();
        assert_eq!(queue.count(5), None);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_peek_is_next_pop() {
        let mut queue = sample();
        assert_eq!(queue.peek(), Some(QueueItem { key: 20, value: &20 }));
        queue.pop();
        assert_eq!(queue.peek(), Some(QueueItem { key: 10, value: &10 }));
    }

    #[test]
    fn test_iter_matches_pop_order() {
        let mut queue = sample();
        let iterated: Vec<(u64, u64)> = queue.iter().map(|item| (item.key, *item.value)).collect();
        let popped: Vec<(u64, u64)> = std::iter::from_fn(|| queue.pop())
            .map(|item| (item.key, item.value))
            .collect();
        assert_eq!(iterated, popped);
    }

    #[test]
    fn test_clear() {
        let mut queue = sample();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.count(20), None);
    }
}
