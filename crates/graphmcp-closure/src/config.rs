use graphmcp_core::{ClosureError, Result, F};
use serde::{Deserialize, Serialize};

/// Settings for one closed-test run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureConfig {
    pub alpha: F,
    pub epsilon: F,   // value substituted for ε-weights
    pub upscale: bool, // rescale every intersection's weights to sum to 1
    pub verbose: bool, // collect a per-intersection explanation trace
    pub adjusted: bool, // adjusted p-values (true) or reject decisions only
    pub parallel: bool,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            epsilon: 1e-3,
            upscale: false,
            verbose: false,
            adjusted: true,
            parallel: true,
        }
    }
}

impl ClosureConfig {
    pub fn new(alpha: F) -> Self {
        Self { alpha, ..Self::default() }
    }

    pub fn with_alpha(mut self, alpha: F) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_epsilon(mut self, epsilon: F) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_upscale(mut self, upscale: bool) -> Self {
        self.upscale = upscale;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_adjusted(mut self, adjusted: bool) -> Self {
        self.adjusted = adjusted;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ClosureError::InvalidAlpha(self.alpha));
        }
        if !(self.epsilon >= 0.0 && self.epsilon < 1.0) {
            return Err(ClosureError::InvalidEpsilon(self.epsilon));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ClosureConfig::default();
        assert_eq!(c.alpha, 0.05);
        assert_eq!(c.epsilon, 1e-3);
        assert!(!c.upscale && !c.verbose && c.adjusted);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert_eq!(ClosureConfig::new(0.0).validate(), Err(ClosureError::InvalidAlpha(0.0)));
        assert!(ClosureConfig::new(F::NAN).validate().is_err());
        assert!(ClosureConfig::new(1.0).validate().is_ok());
        assert_eq!(
            ClosureConfig::default().with_epsilon(1.0).validate(),
            Err(ClosureError::InvalidEpsilon(1.0))
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let c: ClosureConfig =
            serde_json::from_str(r#"{"alpha": 0.025, "upscale": true}"#).unwrap();
        assert_eq!(c.alpha, 0.025);
        assert!(c.upscale);
        assert_eq!(c.epsilon, 1e-3);
    }
}
