use crate::types::Orientation;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Latest-orientation slot shared between the serial reader and the renderer.
///
/// Last write wins: samples published between two reads are lost. The whole
/// `Orientation` is swapped under the channel's lock, so a reader never sees
/// fields from two different samples. Both sides only hold the lock for a
/// copy, so neither can stall the other.
#[derive(Clone)]
pub struct OrientationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    tx: watch::Sender<Orientation>,
    publish_count: AtomicU64,
}

impl OrientationStore {
    /// Create a store holding the identity orientation.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Orientation::default());
        Self {
            inner: Arc::new(StoreInner {
                tx,
                publish_count: AtomicU64::new(0),
            }),
        }
    }

    /// Overwrite the current orientation.
    pub fn publish(&self, sample: Orientation) {
        self.inner.tx.send_replace(sample);
        self.inner.publish_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recently published orientation (non-blocking).
    pub fn read(&self) -> Orientation {
        *self.inner.tx.borrow()
    }

    /// Number of samples published so far.
    pub fn publish_count(&self) -> u64 {
        self.inner.publish_count.load(Ordering::Relaxed)
    }
}

impl Default for OrientationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn initial_value_is_identity() {
        let store = OrientationStore::new();
        assert_eq!(store.read().wxyz(), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(store.publish_count(), 0);
    }

    #[test]
    fn last_write_wins() {
        let store = OrientationStore::new();
        let a = Orientation::from_wxyz(0.0, 1.0, 0.0, 0.0);
        let b = Orientation::from_wxyz(0.0, 0.0, 1.0, 0.0);

        store.publish(a);
        store.publish(b);

        assert_eq!(store.read(), b);
        assert_eq!(store.publish_count(), 2);
    }

    #[test]
    fn clones_share_the_slot() {
        let writer = OrientationStore::new();
        let reader = writer.clone();
        let sample = Orientation::from_wxyz(0.5, 0.5, 0.5, 0.5);

        writer.publish(sample);
        assert_eq!(reader.read(), sample);
    }

    #[test]
    fn concurrent_reads_are_never_torn() {
        let store = OrientationStore::new();
        let done = Arc::new(AtomicBool::new(false));

        // Every published sample has all four fields equal, so a torn read
        // would show up as mismatched fields.
        store.publish(Orientation::from_wxyz(0.0, 0.0, 0.0, 0.0));
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 1..=50_000u32 {
                    let v = i as f32;
                    store.publish(Orientation::from_wxyz(v, v, v, v));
                }
            })
        };

        let reader = {
            let store = store.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut last = 0.0f32;
                while !done.load(Ordering::Acquire) {
                    let [w, x, y, z] = store.read().wxyz();
                    assert!(w == x && x == y && y == z, "torn read: {w} {x} {y} {z}");
                    // Reads observe a monotonic prefix of the writes.
                    assert!(w >= last, "went back from {last} to {w}");
                    last = w;
                }
            })
        };

        writer.join().unwrap();
        done.store(true, Ordering::Release);
        reader.join().unwrap();

        assert_eq!(store.read().wxyz(), [50_000.0; 4]);
        assert_eq!(store.publish_count(), 50_001);
    }
}
