use std::error::Error;
use std::fmt;

/// InputValueError is used if some feed option or parameter does not fulfill the posed
/// requirements, e.g., by requesting more races than the upstream API serves.
#[derive(Debug, Clone)]
pub struct InputValueError;

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid input value")
    }
}

impl Error for InputValueError {}

pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that sort the array x. The sort is stable, i.e. equal elements keep
/// their original relative order, which is the only tie-breaker available for races sharing an
/// advertised start.
pub fn argsort<T: Ord>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..x.len()).collect();

    match order {
        SortOrder::Ascending => idxs.sort_by(|&a, &b| x[a].cmp(&x[b])),
        SortOrder::Descending => idxs.sort_by(|&a, &b| x[b].cmp(&x[a])),
    };

    idxs
}

/// ceil_div returns the smallest integer greater than or equal to a / b. A divisor of zero yields
/// zero instead of panicking.
pub fn ceil_div(a: usize, b: usize) -> usize {
    if b == 0 {
        return 0;
    }
    (a + b - 1) / b
}
