/// RingBuffer provides a buffer with a user-defined capacity. As soon as the capacity is reached,
/// the buffer overwrites the oldest values when new values are pushed to it. It is used to keep a
/// moving average of the most recent fetch durations.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    vals: Vec<T>,
    capacity: usize,
    idx: usize,
}

impl<T: Into<f64> + std::marker::Copy> RingBuffer<T> {
    pub fn new(capacity: usize) -> RingBuffer<T> {
        RingBuffer {
            vals: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            idx: 0,
        }
    }
    pub fn push(&mut self, val: T) {
        if self.vals.len() < self.capacity {
            self.vals.push(val);
        } else {
            self.vals[self.idx] = val;
            self.idx = (self.idx + 1) % self.capacity;
        }
    }
    pub fn len(&self) -> usize {
        self.vals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }
    pub fn get_avg(&self) -> Option<f64> {
        if self.vals.is_empty() {
            return None;
        }
        let sum: f64 = self.vals.iter().map(|&val| val.into()).sum();
        Some(sum / self.vals.len() as f64)
    }
}
