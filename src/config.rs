use crate::error::{QuiverError, Result};

/// Tuning knobs for the multi-queue scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Size at which a per-worker sub-queue is flushed onto the master queue.
    pub sub_queue_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { sub_queue_size: 100 }
    }
}

impl SchedulerConfig {
    /// Builds a configuration with an explicit sub-queue flush threshold.
    pub fn with_sub_queue_size(sub_queue_size: usize) -> Result<Self> {
        if sub_queue_size == 0 {
            return Err(QuiverError::InvalidArgument(
                "sub_queue_size must be positive".into(),
            ));
        }
        Ok(Self { sub_queue_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_one_hundred() {
        assert_eq!(SchedulerConfig::default().sub_queue_size, 100);
    }

    #[test]
    fn zero_threshold_rejected() {
        assert!(SchedulerConfig::with_sub_queue_size(0).is_err());
        assert_eq!(
            SchedulerConfig::with_sub_queue_size(1).unwrap().sub_queue_size,
            1
        );
    }
}
