use std::time::Duration;

/// Averaged wall-clock time of one (program, evaluator, input size) triple.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
  pub evaluator: String,
  pub program: String,
  pub input_size: u64,
  pub seconds: f64,
}

/// Wall-clock durations of repeated executions, the first being the warm-up.
#[derive(Debug, Default)]
pub struct Timings {
  samples: Vec<Duration>,
}

impl Timings {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      samples: Vec::with_capacity(capacity),
    }
  }

  pub fn push(&mut self, sample: Duration) {
    self.samples.push(sample);
  }

  /// Arithmetic mean in seconds of every sample but the warm-up. `None` unless
  /// at least one sample follows the warm-up.
  pub fn average(&self) -> Option<f64> {
    let timed = self.samples.get(1..).filter(|timed| !timed.is_empty())?;
    let total: Duration = timed.iter().sum();

    Some(total.as_secs_f64() / timed.len() as f64)
  }
}

impl FromIterator<Duration> for Timings {
  fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
    Self {
      samples: iter.into_iter().collect(),
    }
  }
}
