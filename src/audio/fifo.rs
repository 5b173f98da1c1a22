use std::collections::VecDeque;
use std::sync::Mutex;

/// Callback fired when the buffered amount drops to the watermark
pub type NotifyCallback = Box<dyn Fn() + Send + Sync>;

/// Kind of the entry at the front of the fifo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoEvent {
    None,
    Samples,
    Marker,
}

enum Entry {
    Samples { data: Vec<f32>, offset: usize },
    Marker,
}

struct Inner {
    entries: VecDeque<Entry>,
    len: usize,
    armed: bool,
}

/// Ordered buffer of sample chunks and track markers between the decoder and
/// the player thread.
///
/// Reads never cross a marker: once a marker reaches the front, `read_samples`
/// returns 0 until `next_event` has consumed it. Sizes are counted in
/// interleaved `f32` values.
pub struct Fifo {
    inner: Mutex<Inner>,
    chunk_size: usize,
    watermark: Mutex<Option<(usize, NotifyCallback)>>,
}

impl Fifo {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                len: 0,
                armed: true,
            }),
            chunk_size: chunk_size.max(1),
            watermark: Mutex::new(None),
        }
    }

    /// Register `callback` to fire once whenever the buffered amount drops to
    /// or below `mark`. It re-arms when the buffer is filled above `mark`.
    pub fn set_notify_callback<F>(&self, mark: usize, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.watermark) = Some((mark, Box::new(callback)));
    }

    /// Number of buffered sample values
    pub fn len(&self) -> usize {
        lock(&self.inner).len
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).entries.is_empty()
    }

    pub fn add_samples(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let mark = lock(&self.watermark).as_ref().map(|(mark, _)| *mark);
        let mut inner = lock(&self.inner);

        for chunk in samples.chunks(self.chunk_size) {
            inner.entries.push_back(Entry::Samples {
                data: chunk.to_vec(),
                offset: 0,
            });
        }
        inner.len += samples.len();

        if let Some(mark) = mark {
            if inner.len > mark {
                inner.armed = true;
            }
        }
    }

    pub fn add_marker(&self) {
        lock(&self.inner).entries.push_back(Entry::Marker);
    }

    /// Inspect the front entry. A marker is removed and returned, samples stay
    /// in place for `read_samples`.
    pub fn next_event(&self) -> FifoEvent {
        let mut inner = lock(&self.inner);
        match inner.entries.front() {
            None => FifoEvent::None,
            Some(Entry::Samples { .. }) => FifoEvent::Samples,
            Some(Entry::Marker) => {
                inner.entries.pop_front();
                FifoEvent::Marker
            }
        }
    }

    /// Copy samples into `out` up to its length or the next marker.
    /// Returns the number of values read.
    pub fn read_samples(&self, out: &mut [f32]) -> usize {
        let mut read = 0;
        let fire = {
            let mut inner = lock(&self.inner);

            while read < out.len() {
                let consumed = match inner.entries.front_mut() {
                    Some(Entry::Samples { data, offset }) => {
                        let n = (data.len() - *offset).min(out.len() - read);
                        out[read..read + n].copy_from_slice(&data[*offset..*offset + n]);
                        *offset += n;
                        read += n;
                        *offset == data.len()
                    }
                    _ => break,
                };
                if consumed {
                    inner.entries.pop_front();
                }
            }
            inner.len -= read;

            match lock(&self.watermark).as_ref() {
                Some((mark, _)) if read > 0 && inner.armed && inner.len <= *mark => {
                    inner.armed = false;
                    true
                }
                _ => false,
            }
        };

        if fire {
            if let Some((_, callback)) = lock(&self.watermark).as_ref() {
                callback();
            }
        }

        read
    }

    /// Drop every entry and re-arm the watermark callback
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.entries.clear();
        inner.len = 0;
        inner.armed = true;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fifo_events_and_markers() {
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);

        let fifo = Fifo::new(3);
        fifo.set_notify_callback(1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fifo.next_event(), FifoEvent::None);
        assert_eq!(fifo.len(), 0);

        fifo.add_samples(&[1.0, 2.0]);
        assert_eq!(fifo.len(), 2);
        fifo.add_marker();
        fifo.add_samples(&[3.0]);
        assert_eq!(fifo.len(), 3);

        let mut sample = [0.0f32; 1];
        assert_eq!(fifo.next_event(), FifoEvent::Samples);
        assert_eq!(fifo.read_samples(&mut sample), 1);
        assert_eq!(sample[0], 1.0);
        assert_eq!(fifo.len(), 2);
        assert_eq!(notified.load(Ordering::SeqCst), 0);

        assert_eq!(fifo.next_event(), FifoEvent::Samples);
        assert_eq!(fifo.read_samples(&mut sample), 1);
        assert_eq!(sample[0], 2.0);
        assert_eq!(fifo.len(), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        // the marker blocks further reads
        assert_eq!(fifo.read_samples(&mut sample), 0);
        assert_eq!(fifo.len(), 1);

        assert_eq!(fifo.next_event(), FifoEvent::Marker);
        assert_eq!(fifo.next_event(), FifoEvent::Samples);
        assert_eq!(fifo.read_samples(&mut sample), 1);
        assert_eq!(sample[0], 3.0);
        assert_eq!(fifo.len(), 0);

        assert_eq!(fifo.next_event(), FifoEvent::None);
        // not re-armed since nothing was added
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fifo_partial_reads_across_chunks() {
        let fifo = Fifo::new(2);
        fifo.add_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let mut out = [0.0f32; 3];
        assert_eq!(fifo.read_samples(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);

        let mut rest = [0.0f32; 8];
        assert_eq!(fifo.read_samples(&mut rest), 2);
        assert_eq!(&rest[..2], &[4.0, 5.0]);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_watermark_rearms_after_refill() {
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);

        let fifo = Fifo::new(4);
        fifo.set_notify_callback(2, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut out = [0.0f32; 2];
        fifo.add_samples(&[0.0; 4]);
        fifo.read_samples(&mut out);
        fifo.read_samples(&mut out);
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        fifo.add_samples(&[0.0; 4]);
        fifo.read_samples(&mut out);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fifo_reset() {
        let fifo = Fifo::new(4);
        fifo.add_samples(&[0.0; 10]);
        fifo.add_marker();

        fifo.reset();
        assert_eq!(fifo.len(), 0);
        assert_eq!(fifo.next_event(), FifoEvent::None);
    }
}
