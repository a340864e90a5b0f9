//! Deterministic sampling of detail records.
//!
//! The verdict depends only on the record's unique id and the configured
//! rate, so replaying a buffered record reproduces the original decision.

use brx_metadata::receiver::SAMPLE_RATE_PRECISION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    /// Parts per ten thousand
    rate: u32,
}

impl Sampler {
    pub fn new(rate: u32) -> Self {
        Self {
            rate: rate.min(SAMPLE_RATE_PRECISION),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    #[inline]
    pub fn should_sample(&self, key: i64) -> bool {
        key.rem_euclid(SAMPLE_RATE_PRECISION as i64) < self.rate as i64
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(SAMPLE_RATE_PRECISION)
    }
}

/// Stable key for a unique id: 31-multiplier hash over UTF-16 units.
/// Identical across processes and releases.
pub fn sample_key(unique_id: &str) -> i64 {
    unique_id
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32)) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleStatus {
    #[default]
    Unknown,
    Sampled,
    Ignored,
}

/// Per-group sampling state. The first qualifying sub-event decides for the
/// whole group; a group sealed without any resolves to ignored.
#[derive(Debug, Clone)]
pub struct SampleGate {
    sampler: Sampler,
    status: SampleStatus,
}

impl SampleGate {
    pub fn new(sampler: Sampler) -> Self {
        Self {
            sampler,
            status: SampleStatus::Unknown,
        }
    }

    pub fn status(&self) -> SampleStatus {
        self.status
    }

    /// Offer one qualifying sub-event of the group keyed by `key`
    pub fn admit(&mut self, key: i64) -> bool {
        if self.status == SampleStatus::Unknown {
            self.status = if self.sampler.should_sample(key) {
                SampleStatus::Sampled
            } else {
                SampleStatus::Ignored
            };
        }
        self.status == SampleStatus::Sampled
    }

    /// No more sub-events will arrive
    pub fn seal(&mut self) -> SampleStatus {
        if self.status == SampleStatus::Unknown {
            self.status = SampleStatus::Ignored;
        }
        self.status
    }

    pub fn is_sampled(&self) -> bool {
        self.status == SampleStatus::Sampled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_100_verdicts() {
        let sampler = Sampler::new(100);
        assert!(sampler.should_sample(0));
        assert!(sampler.should_sample(50));
        assert!(sampler.should_sample(99));
        assert!(!sampler.should_sample(100));
        assert!(!sampler.should_sample(101));
        assert!(sampler.should_sample(10000));
        assert!(sampler.should_sample(10001));
        assert!(!sampler.should_sample(1019903));
    }

    #[test]
    fn test_rate_100_samples_one_percent() {
        let sampler = Sampler::new(100);
        let first: Vec<i64> = (0..20000).filter(|&k| sampler.should_sample(k)).collect();
        assert_eq!(first.len(), 200);
        let second: Vec<i64> = (0..20000).filter(|&k| sampler.should_sample(k)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_samples_everything() {
        let sampler = Sampler::default();
        assert!((-5000..5000).all(|k| sampler.should_sample(k)));
    }

    #[test]
    fn test_zero_rate_samples_nothing() {
        let sampler = Sampler::new(0);
        assert!(!(0..20000).any(|k| sampler.should_sample(k)));
    }

    #[test]
    fn test_negative_keys_are_not_always_sampled() {
        let sampler = Sampler::new(100);
        assert!(!sampler.should_sample(-1));
        assert!(sampler.should_sample(-9950));
    }

    #[test]
    fn test_rate_clamped() {
        assert_eq!(Sampler::new(20000).rate(), SAMPLE_RATE_PRECISION);
    }

    #[test]
    fn test_sample_key_is_stable() {
        assert_eq!(sample_key(""), 0);
        assert_eq!(sample_key("a"), 97);
        assert_eq!(sample_key("ab"), 97 * 31 + 98);
        assert_eq!(sample_key("hello"), 99162322);
        assert_eq!(sample_key("u-123"), sample_key("u-123"));
    }

    #[test]
    fn test_group_all_or_nothing() {
        for rate in [0, 100, 5000, 10000] {
            for key in [0i64, 99, 100, 4999, 5000, 9999, -7] {
                let mut gate = SampleGate::new(Sampler::new(rate));
                let verdicts: Vec<bool> = (0..3).map(|_| gate.admit(key)).collect();
                assert!(
                    verdicts.iter().all(|&v| v) || verdicts.iter().all(|&v| !v),
                    "rate {rate} key {key} split: {verdicts:?}"
                );
            }
        }
    }

    #[test]
    fn test_first_decision_sticks() {
        let mut gate = SampleGate::new(Sampler::new(100));
        assert!(!gate.admit(500));
        // A later sub-event with a sampling key does not flip the group
        assert!(!gate.admit(1));
        assert_eq!(gate.status(), SampleStatus::Ignored);

        let mut gate = SampleGate::new(Sampler::new(100));
        assert!(gate.admit(1));
        assert!(gate.admit(500));
        assert_eq!(gate.seal(), SampleStatus::Sampled);
    }

    #[test]
    fn test_empty_group_is_ignored() {
        let mut gate = SampleGate::new(Sampler::default());
        assert_eq!(gate.status(), SampleStatus::Unknown);
        assert_eq!(gate.seal(), SampleStatus::Ignored);
        assert!(!gate.is_sampled());
    }
}
