//! Generation counter for subscription cancellation.
//!
//! Every subscription a session opens is tagged with a fresh generation.
//! Anything delivered under an older tag is stale and must not reach the
//! mirror, no matter how late it arrives.

use mirror_sync_types::Generation;

/// Hands out strictly increasing generations.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Generation,
}

impl GenerationCounter {
    /// Create a counter at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to and return the next generation.
    ///
    /// Everything tagged with an earlier generation becomes stale.
    pub fn advance(&mut self) -> Generation {
        self.current = self.current.next();
        self.current
    }

    /// The most recently issued generation.
    pub fn current(&self) -> Generation {
        self.current
    }

    /// Whether `generation` is the most recently issued one.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(GenerationCounter::new().current(), Generation::zero());
    }

    #[test]
    fn advance_is_strictly_increasing() {
        let mut counter = GenerationCounter::new();
        let first = counter.advance();
        let second = counter.advance();
        assert!(second > first);
        assert_eq!(counter.current(), second);
    }

    #[test]
    fn older_generations_are_not_current() {
        let mut counter = GenerationCounter::new();
        let old = counter.advance();
        counter.advance();
        assert!(!counter.is_current(old));
    }
}
