//! Pre-model smoothing stage.
//!
//! A rolling mean over the last N feature vectors takes the edge off
//! single-tick sampling noise before anything reaches the models. Until
//! the window fills (the first N-1 ticks after startup) the smoother
//! yields nothing and the engine skips the tick.

use std::collections::{HashMap, VecDeque};

use nalgebra::DVector;

use super::features::FeatureOrder;

/// Fixed-capacity FIFO of feature vectors with an element-wise mean.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buffer: VecDeque<DVector<f64>>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: DVector<f64>) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Element-wise mean of the buffered vectors; `None` when empty.
    pub fn mean(&self) -> Option<DVector<f64>> {
        let first = self.buffer.front()?;
        let mut sum = DVector::zeros(first.len());
        for v in &self.buffer {
            sum += v;
        }
        Some(sum / self.buffer.len() as f64)
    }
}

/// Builds the feature vector and applies the rolling mean.
#[derive(Debug, Clone)]
pub struct DataSmoother {
    order: FeatureOrder,
    window: RollingWindow,
}

impl DataSmoother {
    pub fn new(order: FeatureOrder, window_size: usize) -> Self {
        Self {
            order,
            window: RollingWindow::new(window_size),
        }
    }

    pub fn feature_order(&self) -> &FeatureOrder {
        &self.order
    }

    /// Ingest one raw metrics map. Returns the smoothed vector once the
    /// window is full, `None` while warming up.
    pub fn process(&mut self, raw_metrics: &HashMap<String, f64>) -> Option<DVector<f64>> {
        let x_raw = self.order.build_vector(raw_metrics);
        self.window.push(x_raw);

        if self.window.is_full() {
            self.window.mean()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> FeatureOrder {
        FeatureOrder::new(vec!["a".to_string(), "b".to_string()]).unwrap()
    }

    fn metrics(a: f64, b: f64) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("a".to_string(), a);
        m.insert("b".to_string(), b);
        m
    }

    #[test]
    fn test_warming_window_yields_nothing() {
        let mut smoother = DataSmoother::new(order(), 3);
        assert!(smoother.process(&metrics(1.0, 1.0)).is_none());
        assert!(smoother.process(&metrics(2.0, 2.0)).is_none());
        assert!(smoother.process(&metrics(3.0, 3.0)).is_some());
    }

    #[test]
    fn test_mean_over_full_window() {
        let mut smoother = DataSmoother::new(order(), 3);
        smoother.process(&metrics(1.0, 10.0));
        smoother.process(&metrics(2.0, 20.0));
        let x = smoother.process(&metrics(3.0, 30.0)).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut smoother = DataSmoother::new(order(), 2);
        smoother.process(&metrics(0.0, 0.0));
        smoother.process(&metrics(10.0, 10.0));
        let x = smoother.process(&metrics(20.0, 20.0)).unwrap();
        assert!((x[0] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_window_mean_empty() {
        let window = RollingWindow::new(3);
        assert!(window.mean().is_none());
        assert!(window.is_empty());
    }

    #[test]
    fn test_window_of_one_passes_through() {
        let mut smoother = DataSmoother::new(order(), 1);
        let x = smoother.process(&metrics(7.0, -7.0)).unwrap();
        assert!((x[0] - 7.0).abs() < 1e-12);
        assert!((x[1] + 7.0).abs() < 1e-12);
    }
}
