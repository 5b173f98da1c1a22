use std::sync::Mutex;

/// Fixed-capacity ring buffer shared between a producer and a consumer thread.
///
/// All operations take the internal lock; writes and reads are partial when the
/// buffer is full or short.
#[derive(Debug)]
pub struct RingBuffer<T> {
    inner: Mutex<Ring<T>>,
    capacity: usize,
}

#[derive(Debug)]
struct Ring<T> {
    data: Vec<T>,
    read_pos: usize,
    write_pos: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring {
                data: vec![T::default(); capacity],
                read_pos: 0,
                write_pos: 0,
                len: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items that can be written without overwriting unread data
    pub fn free_size(&self) -> usize {
        self.capacity - self.lock().len
    }

    /// Number of items waiting to be read
    pub fn available(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Write as much of `data` as fits. Returns the number of items written.
    pub fn write(&self, data: &[T]) -> usize {
        let mut ring = self.lock();
        let to_write = data.len().min(self.capacity - ring.len);

        for &item in &data[..to_write] {
            let pos = ring.write_pos;
            ring.data[pos] = item;
            ring.write_pos = (pos + 1) % self.capacity;
        }
        ring.len += to_write;

        to_write
    }

    /// Read up to `out.len()` items. Returns the number of items read.
    pub fn read(&self, out: &mut [T]) -> usize {
        let mut ring = self.lock();
        let to_read = out.len().min(ring.len);

        for slot in out[..to_read].iter_mut() {
            let pos = ring.read_pos;
            *slot = ring.data[pos];
            ring.read_pos = (pos + 1) % self.capacity;
        }
        ring.len -= to_read;

        to_read
    }

    /// Drop all unread data
    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.read_pos = 0;
        ring.write_pos = 0;
        ring.len = 0;
    }

    /// Fill level from 0.0 to 1.0
    pub fn fill_level(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.available() as f32 / self.capacity as f32
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring<T>> {
        // no operation can panic half-way, poisoning is ignored
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ring_buffer_sizes() {
        let buffer = RingBuffer::<u8>::new(3);

        assert_eq!(buffer.available(), 0);
        assert_eq!(buffer.free_size(), 3);

        buffer.write(b"a");
        assert_eq!(buffer.available(), 1);
        assert_eq!(buffer.free_size(), 2);

        buffer.write(b"bc");
        assert_eq!(buffer.available(), 3);
        assert_eq!(buffer.free_size(), 0);

        let mut t1 = [0u8; 2];
        assert_eq!(buffer.read(&mut t1), 2);
        assert_eq!(buffer.available(), 1);
        assert_eq!(buffer.free_size(), 2);
        assert_eq!(&t1, b"ab");

        let mut t2 = [0u8; 1];
        assert_eq!(buffer.read(&mut t2), 1);
        assert_eq!(buffer.available(), 0);
        assert_eq!(buffer.free_size(), 3);
        assert_eq!(&t2, b"c");
    }

    #[test]
    fn test_ring_buffer_partial_write_and_wrap_around() {
        let buffer = RingBuffer::<f32>::new(4);

        assert_eq!(buffer.write(&[1.0, 2.0, 3.0]), 3);

        let mut out = [0.0; 2];
        assert_eq!(buffer.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);

        // only three slots are free, the last item is rejected
        assert_eq!(buffer.write(&[4.0, 5.0, 6.0, 7.0]), 3);
        assert_eq!(buffer.free_size(), 0);

        let mut all = [0.0; 8];
        assert_eq!(buffer.read(&mut all), 4);
        assert_eq!(&all[..4], &[3.0, 4.0, 5.0, 6.0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_ring_buffer_clear() {
        let buffer = RingBuffer::<f32>::new(8);
        buffer.write(&[0.5; 6]);
        assert!((buffer.fill_level() - 0.75).abs() < f32::EPSILON);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.free_size(), 8);
    }

    #[test]
    fn test_ring_buffer_threads() {
        let buffer = Arc::new(RingBuffer::<f32>::new(64));
        let producer_buffer = Arc::clone(&buffer);

        let producer = thread::spawn(move || {
            let mut written = 0;
            while written < 1000 {
                let chunk: Vec<f32> = (written..(written + 10).min(1000)).map(|i| i as f32).collect();
                written += producer_buffer.write(&chunk);
                thread::yield_now();
            }
        });

        let mut received = Vec::new();
        let mut chunk = [0.0f32; 16];
        while received.len() < 1000 {
            let n = buffer.read(&mut chunk);
            received.extend_from_slice(&chunk[..n]);
            thread::yield_now();
        }
        producer.join().unwrap();

        let expected: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        assert_eq!(received, expected);
    }
}
