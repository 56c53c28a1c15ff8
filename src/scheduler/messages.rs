//! Message capability set and the two stock combiners.

use serde::{Deserialize, Serialize};

/// A schedulable per-vertex message.
///
/// Multiple messages addressed to the same vertex are folded with
/// [`Message::combine`], which must be associative and commutative; the
/// scheduler delivers the folded aggregate once.
pub trait Message: Clone + Send + 'static {
    fn combine(&mut self, other: Self);
    fn priority(&self) -> f64;
}

/// Combiner that adds priorities.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SumMessage {
    pub prio: f64,
}

impl SumMessage {
    pub fn new(prio: f64) -> Self {
        Self { prio }
    }
}

impl Message for SumMessage {
    fn combine(&mut self, other: Self) {
        self.prio += other.prio;
    }

    fn priority(&self) -> f64 {
        self.prio
    }
}

/// Combiner that keeps the largest priority.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MaxMessage {
    pub prio: f64,
}

impl MaxMessage {
    pub fn new(prio: f64) -> Self {
        Self { prio }
    }
}

impl Message for MaxMessage {
    fn combine(&mut self, other: Self) {
        self.prio = self.prio.max(other.prio);
    }

    fn priority(&self) -> f64 {
        self.prio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_adds_priorities() {
        let mut message = SumMessage::new(1.0);
        message.combine(SumMessage::new(2.5));
        assert_eq!(message.priority(), 3.5);
    }

    #[test]
    fn max_keeps_largest() {
        let mut message = MaxMessage::new(1.0);
        message.combine(MaxMessage::new(0.25));
        assert_eq!(message.priority(), 1.0);
        message.combine(MaxMessage::new(4.0));
        assert_eq!(message.priority(), 4.0);
    }
}
