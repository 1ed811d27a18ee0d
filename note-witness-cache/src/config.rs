use crate::WitnessCacheError;

/// Settings of a [`WitnessCache`](crate::WitnessCache).
///
/// `retained_depth` is the number of blocks whose witness state is kept for
/// every tracked note, i.e. the deepest reorg that can be undone with
/// [`WitnessCache::disconnect`](crate::WitnessCache::disconnect). There is no
/// default: it has to cover the deepest reorg the deployment tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WitnessCacheConfig {
    retained_depth: usize,
}

impl WitnessCacheConfig {
    /// Create a config retaining `retained_depth` blocks of history.
    pub fn new(retained_depth: usize) -> Result<Self, WitnessCacheError> {
        if retained_depth == 0 {
            return Err(WitnessCacheError::InvalidConfig(
                "retained depth must be at least 1".to_string(),
            ));
        }
        Ok(Self { retained_depth })
    }

    /// Number of blocks of witness history kept per note.
    pub fn retained_depth(&self) -> usize {
        self.retained_depth
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_zero_depth_rejected() {
        assert_matches!(
            WitnessCacheConfig::new(0),
            Err(WitnessCacheError::InvalidConfig(_))
        );
        assert_eq!(WitnessCacheConfig::new(100).unwrap().retained_depth(), 100);
    }
}
