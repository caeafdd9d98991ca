use crate::Collector;
use anyhow::Result;
use metrik_common::Metric;
use rand::Rng;

/// Gauge `RandomValue`, uniform in `[0, 1)`.
#[derive(Default)]
pub struct RandomCollector;

impl RandomCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for RandomCollector {
    fn name(&self) -> &str {
        "random"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        let value: f64 = rand::thread_rng().gen_range(0.0..1.0);
        Ok(vec![Metric::gauge("RandomValue", value)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_in_unit_interval() {
        let mut collector = RandomCollector::new();
        for _ in 0..100 {
            let metrics = collector.collect().unwrap();
            let v = metrics[0].float_value().unwrap();
            assert!((0.0..1.0).contains(&v), "{v}");
        }
    }
}
