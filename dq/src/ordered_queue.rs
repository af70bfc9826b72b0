//! OrderedQueue - lock-free multi-producer, single-consumer FIFO
//!
//! Producers prepend nodes to a singly-linked list with a CAS loop, so the
//! shared list is always newest-first. The single consumer rebuilds oldest-first
//! order lazily by filling back links, which keeps pop amortized O(1).
//!
//! ```text
//!   front (AtomicPtr, shared)                          back (consumer only)
//!        │                                                   │
//!        ▼                                                   ▼
//!     [node 5] ──next──► [node 4] ──next──► [node 3] ──next──► (null)
//!        ▲                  │  ▲               │
//!        └──────prev────────┘  └─────prev──────┘
//! ```
//!
//! Ownership of a node moves producer → list (on push) → consumer (on pop).
//! Producers never dereference a node after publishing it, and only the
//! consumer frees nodes, after they are unlinked. That rules out use-after-free
//! and ABA on `front`.

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    item: T,
    /// Next-older node. Written by the producer before the node is published.
    next: *mut Node<T>,
    /// Next-newer node. Filled lazily by the consumer.
    prev: *mut Node<T>,
}

/// Shared half of the queue: the newest-node pointer
struct Head<T> {
    front: AtomicPtr<Node<T>>,
}

// Items are moved between threads but never shared by reference.
unsafe impl<T: Send> Send for Head<T> {}
unsafe impl<T: Send> Sync for Head<T> {}

impl<T> Head<T> {
    fn new() -> Self {
        Self {
            front: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn push(&self, item: T) {
        let node = Box::into_raw(Box::new(Node {
            item,
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
        }));

        let mut current = self.front.load(Ordering::Relaxed);
        loop {
            // SAFETY: node is not published yet, this thread is its only owner
            unsafe {
                (*node).next = current;
            }
            match self
                .front
                .compare_exchange_weak(current, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T> Drop for Head<T> {
    fn drop(&mut self) {
        // Every unpopped node is reachable from front: the consumer severs the
        // forward link of each node it pops.
        let mut node = *self.front.get_mut();
        while !node.is_null() {
            // SAFETY: last reference to the list, nodes were allocated by push
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
        }
    }
}

/// Lock-free FIFO with many producers and exactly one consumer.
///
/// - `push`: any thread, through `&self` or a cloned [`QueueSender`]
/// - `pop`: requires `&mut self`; the queue is `Send` but not `Sync`, so only
///   one thread can pop at a time
pub struct OrderedQueue<T> {
    head: Arc<Head<T>>,
    /// Oldest node not yet popped, or null when unknown
    back: *mut Node<T>,
}

unsafe impl<T: Send> Send for OrderedQueue<T> {}

impl<T> OrderedQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            head: Arc::new(Head::new()),
            back: ptr::null_mut(),
        }
    }

    /// Push an item; lock-free, never blocks, never fails
    pub fn push(&self, item: T) {
        self.head.push(item);
    }

    /// Get a producer handle that can be moved to other threads
    pub fn sender(&self) -> QueueSender<T> {
        QueueSender {
            head: Arc::clone(&self.head),
        }
    }

    /// Check whether nothing is currently queued (snapshot)
    pub fn is_empty(&self) -> bool {
        self.back.is_null() && self.head.front.load(Ordering::Acquire).is_null()
    }

    /// Pop the oldest item, or `None` if the queue is empty
    pub fn pop(&mut self) -> Option<T> {
        let node = self.pop_node()?;
        // SAFETY: pop_node unlinked the node, the consumer is now its sole owner
        let node = unsafe { Box::from_raw(node) };
        Some(node.item)
    }

    fn pop_node(&mut self) -> Option<*mut Node<T>> {
        let front = &self.head.front;

        if self.back.is_null() {
            // SAFETY: only the consumer touches back links
            self.back = unsafe { fill_back_links(front) };
        }
        if self.back.is_null() {
            return None;
        }

        let oldest = self.back;

        // Last node in the list: claim it by emptying front. A failed CAS means
        // a producer prepended in the meantime, so a back link exists.
        if front
            .compare_exchange(oldest, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.back = ptr::null_mut();
            return Some(oldest);
        }

        // SAFETY: oldest and its newer neighbour are live list nodes; producers
        // never read or write next/prev of published nodes.
        unsafe {
            if (*oldest).prev.is_null() {
                fill_back_links(front);
            }
            let newer = (*oldest).prev;
            (*newer).next = ptr::null_mut();
            self.back = newer;
        }

        Some(oldest)
    }
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk from the newest node toward older ones, filling back links.
///
/// Stops at the first node whose back link was already known, or at the end of
/// the list, and returns the last node visited. When no back link is known yet
/// that is the oldest node.
///
/// # Safety
/// Must only be called by the single consumer.
unsafe fn fill_back_links<T>(front: &AtomicPtr<Node<T>>) -> *mut Node<T> {
    let mut node = front.load(Ordering::Acquire);
    if node.is_null() {
        return node;
    }
    unsafe {
        loop {
            let older = (*node).next;
            if older.is_null() {
                return node;
            }
            let known = !(*older).prev.is_null();
            (*older).prev = node;
            if known {
                return older;
            }
            node = older;
        }
    }
}

/// Cloneable producer handle for an [`OrderedQueue`]
pub struct QueueSender<T> {
    head: Arc<Head<T>>,
}

impl<T> QueueSender<T> {
    /// Push an item; lock-free, never blocks, never fails
    pub fn push(&self, item: T) {
        self.head.push(item);
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            head: Arc::clone(&self.head),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_empty() {
        let mut queue: OrderedQueue<i32> = OrderedQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_one_element() {
        let mut queue = OrderedQueue::new();
        queue.push(5);
        assert!(!queue.is_empty());
        assert_eq!(queue.pop(), Some(5));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_fifo() {
        let mut queue = OrderedQueue::new();
        queue.push(5);
        queue.push(4);
        queue.push(6);

        assert_eq!(queue.pop(), Some(5));
        assert_eq!(queue.pop(), Some(4));
        assert_eq!(queue.pop(), Some(6));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_push_pop_push_pop() {
        let mut queue = OrderedQueue::new();

        queue.push(5);
        assert_eq!(queue.pop(), Some(5));

        queue.push(4);
        assert_eq!(queue.pop(), Some(4));

        queue.push(6);
        assert_eq!(queue.pop(), Some(6));

        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_while_partially_drained() {
        let mut queue = OrderedQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop(), Some(1));

        // New nodes land in front of a list whose back links are partly known
        queue.push(4);
        queue.push(5);
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        queue.push(6);
        assert_eq!(queue.pop(), Some(4));
        assert_eq!(queue.pop(), Some(5));
        assert_eq!(queue.pop(), Some(6));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_sender_pushes_visible_to_consumer() {
        let mut queue = OrderedQueue::new();
        let sender = queue.sender();
        sender.push("a");
        queue.push("b");
        sender.clone().push("c");

        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.pop(), Some("c"));
    }

    #[test]
    fn test_multithread_producers() {
        const WORKERS: usize = 100;
        let mut queue = OrderedQueue::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..WORKERS)
            .map(|index| {
                let sender = queue.sender();
                let finished = Arc::clone(&finished);
                thread::spawn(move || {
                    for x in 0..WORKERS {
                        sender.push(WORKERS * index + x);
                    }
                    finished.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        let mut counters: BTreeMap<usize, usize> = BTreeMap::new();
        loop {
            let done = finished.load(Ordering::SeqCst) == WORKERS;
            while let Some(value) = queue.pop() {
                *counters.entry(value).or_default() += 1;
            }
            if done {
                break;
            }
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.len(), WORKERS * WORKERS);
        for index in 0..WORKERS * WORKERS {
            assert_eq!(counters[&index], 1, "value {} seen wrong number of times", index);
        }
    }

    #[test]
    fn test_per_producer_order_preserved() {
        let mut queue = OrderedQueue::new();
        let handles: Vec<_> = (0..4u64)
            .map(|producer| {
                let sender = queue.sender();
                thread::spawn(move || {
                    for seq in 0..1_000u64 {
                        sender.push((producer, seq));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seen = [None::<u64>; 4];
        while let Some((producer, seq)) = queue.pop() {
            let slot = &mut last_seen[producer as usize];
            if let Some(prev) = *slot {
                assert!(seq > prev, "producer {} out of order: {} after {}", producer, seq, prev);
            }
            *slot = Some(seq);
        }
        assert!(last_seen.iter().all(|s| *s == Some(999)));
    }

    #[test]
    fn test_drop_releases_unpopped_items() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let mut queue = OrderedQueue::new();
            for _ in 0..5 {
                queue.push(Tracked(Arc::clone(&drops)));
            }
            drop(queue.pop());
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_sender_outlives_queue() {
        let queue = OrderedQueue::new();
        let sender = queue.sender();
        drop(queue);
        // Pushing into an orphaned list is allowed; the last handle frees it
        sender.push(String::from("late"));
    }
}
