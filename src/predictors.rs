//! Small running-median predictors used by the position codecs.

use num_traits::Zero;

/// Median of the last three values added, in round robin order.
#[derive(Debug, Copy, Clone)]
pub struct Median3<T: Zero + Copy + PartialOrd> {
    values: [T; 3],
    next: usize,
}

impl<T: Zero + Copy + PartialOrd> Median3<T> {
    pub fn new() -> Self {
        Self {
            values: [T::zero(); 3],
            next: 0,
        }
    }

    pub fn add(&mut self, v: T) {
        self.values[self.next] = v;
        self.next = if self.next == 2 { 0 } else { self.next + 1 };
    }

    pub fn get(&self) -> T {
        let [a, b, c] = self.values;
        if a < b {
            if b < c {
                b
            } else if a < c {
                c
            } else {
                a
            }
        } else if a < c {
            a
        } else if b < c {
            c
        } else {
            b
        }
    }
}

impl<T: Zero + Copy + PartialOrd> Default for Median3<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Approximate median of a stream, kept in a sorted window of five values.
///
/// New values alternately push out the largest or the smallest entry,
/// the middle entry is the prediction.
#[derive(Debug, Copy, Clone)]
pub struct StreamingMedian<T: Zero + Copy + PartialOrd> {
    values: [T; 5],
    high: bool,
}

impl<T: Zero + Copy + PartialOrd> StreamingMedian<T> {
    pub fn new() -> Self {
        Self {
            values: [T::zero(); 5],
            high: true,
        }
    }

    pub fn add(&mut self, v: T) {
        let values = &mut self.values;
        if self.high {
            if v < values[2] {
                values[4] = values[3];
                values[3] = values[2];
                if v < values[0] {
                    values[2] = values[1];
                    values[1] = values[0];
                    values[0] = v;
                } else if v < values[1] {
                    values[2] = values[1];
                    values[1] = v;
                } else {
                    values[2] = v;
                }
            } else {
                if v < values[3] {
                    values[4] = values[3];
                    values[3] = v;
                } else {
                    values[4] = v;
                }
                self.high = false;
            }
        } else if values[2] < v {
            values[0] = values[1];
            values[1] = values[2];
            if values[4] < v {
                values[2] = values[3];
                values[3] = values[4];
                values[4] = v;
            } else if values[3] < v {
                values[2] = values[3];
                values[3] = v;
            } else {
                values[2] = v;
            }
        } else {
            if values[1] < v {
                values[0] = values[1];
                values[1] = v;
            } else {
                values[0] = v;
            }
            self.high = true;
        }
    }

    pub fn get(&self) -> T {
        self.values[2]
    }
}

impl<T: Zero + Copy + PartialOrd> Default for StreamingMedian<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_median3() {
        let mut m = Median3::<i32>::new();
        assert_eq!(m.get(), 0);
        m.add(5);
        m.add(-3);
        m.add(10);
        assert_eq!(m.get(), 5);
        // overwrites the 5
        m.add(1);
        assert_eq!(m.get(), 1);
        m.add(1);
        m.add(1);
        assert_eq!(m.get(), 1);
    }

    #[test]
    fn test_streaming_median_window_stays_sorted() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut median = StreamingMedian::<i32>::new();
        for _ in 0..10_000 {
            median.add(rng.gen_range(-1000..1000));
            let mut sorted = median.values;
            sorted.sort_unstable();
            assert_eq!(sorted, median.values);
            assert_eq!(median.get(), median.values[2]);
        }
    }

    #[test]
    fn test_streaming_median_follows_constant_input() {
        let mut median = StreamingMedian::<i32>::new();
        for _ in 0..5 {
            median.add(17);
        }
        assert_eq!(median.get(), 17);
    }
}
