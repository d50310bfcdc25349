//! Rolling record of episode outcomes.
use std::collections::VecDeque;

/// Number of recent episodes used to estimate the success rate.
pub const SUCCESS_HISTORY_LEN: usize = 100;

/// Success flags of the most recently inserted episodes.
#[derive(Debug, Clone)]
pub(crate) struct SuccessHistory {
    window_size: usize,
    values: VecDeque<bool>,
}

impl SuccessHistory {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            values: VecDeque::with_capacity(window_size),
        }
    }

    pub fn push(&mut self, success: bool) {
        self.values.push_back(success);
        if self.values.len() > self.window_size {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Mean of the recorded flags, `None` if nothing was recorded.
    pub fn rate(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            let n = self.values.iter().filter(|&&s| s).count();
            Some(n as f64 / self.values.len() as f64)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_window_drops_oldest() {
        let mut history = SuccessHistory::new(4);
        assert_eq!(history.rate(), None);
        for s in [true, true, false, false, false, false] {
            history.push(s);
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.rate(), Some(0.0));
        history.push(true);
        assert_eq!(history.rate(), Some(0.25));
    }
}
