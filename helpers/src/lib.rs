pub mod buffer;
pub mod general;

#[cfg(test)]
mod buffer_tests {
    use crate::buffer::RingBuffer;
    use approx::assert_ulps_eq;

    #[test]
    fn test_ringbuffer_empty() {
        let x: RingBuffer<u32> = RingBuffer::new(5);
        assert!(x.get_avg().is_none());
        assert!(x.is_empty());
    }
    #[test]
    fn test_ringbuffer_partial() {
        let mut x: RingBuffer<u32> = RingBuffer::new(5);
        x.push(120);
        x.push(80);
        assert_eq!(x.len(), 2);
        assert_ulps_eq!(x.get_avg().unwrap(), 100.0);
    }
    #[test]
    fn test_ringbuffer_overwrites_oldest() {
        let mut x: RingBuffer<u32> = RingBuffer::new(5);
        x.push(3);
        x.push(4);
        x.push(2);
        x.push(1);
        x.push(5);
        x.push(10);
        assert_eq!(x.len(), 5);
        assert_ulps_eq!(x.get_avg().unwrap(), 4.4);
    }
    #[test]
    fn test_ringbuffer_zero_capacity() {
        let mut x: RingBuffer<u32> = RingBuffer::new(0);
        x.push(7);
        x.push(9);
        assert_eq!(x.len(), 1);
        assert_ulps_eq!(x.get_avg().unwrap(), 9.0);
    }
}

#[cfg(test)]
mod general_tests {
    use crate::general::{argsort, ceil_div, SortOrder};

    #[test]
    fn test_argsort_ascending() {
        let x: Vec<i64> = vec![3, -1, 5, 8, -2];
        assert_eq!(argsort(&x, SortOrder::Ascending), vec![4, 1, 0, 2, 3]);
    }
    #[test]
    fn test_argsort_descending() {
        let x: Vec<i64> = vec![3, -1, 5, 8, -2];
        assert_eq!(argsort(&x, SortOrder::Descending), vec![3, 2, 0, 1, 4]);
    }
    #[test]
    fn test_argsort_keeps_ties_in_order() {
        let x: Vec<i64> = vec![100, 50, 100, 50, 100];
        assert_eq!(argsort(&x, SortOrder::Ascending), vec![1, 3, 0, 2, 4]);
        assert_eq!(argsort(&x, SortOrder::Descending), vec![0, 2, 4, 1, 3]);
    }
    #[test]
    fn test_argsort_empty() {
        let x: Vec<i64> = vec![];
        assert!(argsort(&x, SortOrder::Ascending).is_empty());
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(0, 5), 0);
        assert_eq!(ceil_div(5, 5), 1);
        assert_eq!(ceil_div(6, 5), 2);
        assert_eq!(ceil_div(11, 5), 3);
        assert_eq!(ceil_div(3, 0), 0);
    }
}
