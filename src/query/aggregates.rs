use super::scanner::AggregateFunction;
use std::any::Any;

/// Running state of one bucket aggregate
pub trait Accumulator: Send + Sync + AsAny {
    /// Add a sample value
    fn accumulate(&mut self, value: f64);

    /// Final aggregate, `None` if nothing was accumulated
    fn result(&self) -> Option<f64>;

    /// Create a fresh copy of this accumulator
    fn clone_box(&self) -> Box<dyn Accumulator>;

    /// Merge another accumulator into this one (for parallel aggregation)
    fn merge(&mut self, other: &dyn Accumulator);
}

/// Helper trait to enable downcasting
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Arithmetic mean
#[derive(Debug, Clone, Default)]
pub struct MeanAccumulator {
    sum: f64,
    count: u64,
}

impl MeanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for MeanAccumulator {
    fn accumulate(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn result(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }

    fn merge(&mut self, other: &dyn Accumulator) {
        if let Some(mean_acc) = other.as_any().downcast_ref::<MeanAccumulator>() {
            self.sum += mean_acc.sum;
            self.count += mean_acc.count;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MinAccumulator {
    min: Option<f64>,
}

impl MinAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for MinAccumulator {
    fn accumulate(&mut self, value: f64) {
        self.min = Some(match self.min {
            Some(current) if current <= value => current,
            _ => value,
        });
    }

    fn result(&self) -> Option<f64> {
        self.min
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }

    fn merge(&mut self, other: &dyn Accumulator) {
        if let Some(min_acc) = other.as_any().downcast_ref::<MinAccumulator>() {
            if let Some(other_min) = min_acc.min {
                self.accumulate(other_min);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaxAccumulator {
    max: Option<f64>,
}

impl MaxAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for MaxAccumulator {
    fn accumulate(&mut self, value: f64) {
        self.max = Some(match self.max {
            Some(current) if current >= value => current,
            _ => value,
        });
    }

    fn result(&self) -> Option<f64> {
        self.max
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }

    fn merge(&mut self, other: &dyn Accumulator) {
        if let Some(max_acc) = other.as_any().downcast_ref::<MaxAccumulator>() {
            if let Some(other_max) = max_acc.max {
                self.accumulate(other_max);
            }
        }
    }
}

pub fn create_accumulator(func: AggregateFunction) -> Box<dyn Accumulator> {
    match func {
        AggregateFunction::Mean => Box::new(MeanAccumulator::new()),
        AggregateFunction::Min => Box::new(MinAccumulator::new()),
        AggregateFunction::Max => Box::new(MaxAccumulator::new()),
    }
}
