/*!
Running average accumulator.
*/

/// Sum and count of all values seen during a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    sum: f64,
    count: u64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Mean of all updates, or `None` before the first one
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_three() {
        let mut avg = RunningAverage::new();
        for value in [10.0, 20.0, 30.0] {
            avg.update(value);
        }
        assert_eq!(avg.mean(), Some(20.0));
        assert_eq!(avg.count(), 3);
        assert_eq!(avg.sum(), 60.0);
    }

    #[test]
    fn test_no_data_yet() {
        let avg = RunningAverage::new();
        assert_eq!(avg.mean(), None);
        assert_eq!(avg.count(), 0);
    }

    #[test]
    fn test_reset() {
        let mut avg = RunningAverage::new();
        avg.update(5.0);
        avg.reset();
        assert_eq!(avg.mean(), None);
    }
}
