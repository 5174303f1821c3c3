//! Concurrency limit bookkeeping.
//!
//! Not synchronized on its own: the controller only touches it under its run lock, which is
//! what keeps `active <= max` under concurrent settlements.

/// Counter of occupied slots, bounded by `max`.
#[derive(Debug)]
pub struct Slots {
    max: usize,
    active: usize,
    peak: usize,
}

impl Slots {
    /// `max` must be positive; [`crate::BatchConfig::validate`] enforces it.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            active: 0,
            peak: 0,
        }
    }

    /// Occupy a slot if one is free.
    pub fn try_acquire(&mut self) -> bool {
        if self.active >= self.max {
            return false;
        }
        self.active += 1;
        self.peak = self.peak.max(self.active);
        true
    }

    /// Free a slot held by a settled task.
    pub fn release(&mut self) {
        debug_assert!(self.active > 0, "release without a matching acquire");
        self.active = self.active.saturating_sub(1);
    }

    #[inline]
    pub fn active(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.max - self.active
    }

    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Highest `active` value seen so far.
    #[inline]
    pub fn peak(&self) -> usize {
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_until_exhausted() {
        let mut s = Slots::new(2);
        assert!(s.try_acquire());
        assert!(s.try_acquire());
        assert!(!s.try_acquire());
        assert_eq!(s.active(), 2);
        assert_eq!(s.available(), 0);
    }

    #[test]
    fn release_frees_capacity() {
        let mut s = Slots::new(1);
        assert!(s.try_acquire());
        s.release();
        assert_eq!(s.active(), 0);
        assert!(s.try_acquire());
        assert_eq!(s.peak(), 1);
    }

    #[test]
    fn peak_tracks_high_water_mark() {
        let mut s = Slots::new(3);
        s.try_acquire();
        s.try_acquire();
        s.release();
        s.try_acquire();
        s.release();
        s.release();
        assert_eq!(s.peak(), 2);
        assert_eq!(s.max(), 3);
    }
}
