mod normal;
pub mod bonferroni;
pub mod simes;
pub mod parametric;

pub use bonferroni::Bonferroni;
pub use simes::Simes;
pub use parametric::Parametric;

use graphmcp_core::{ClosureError, WeightedTest};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Built-in tests, selectable by name from configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    #[default]
    Bonferroni,
    Simes,
    Parametric,
}

impl TestKind {
    pub fn build(self) -> Box<dyn WeightedTest> {
        match self {
            TestKind::Bonferroni => Box::new(Bonferroni),
            TestKind::Simes => Box::new(Simes),
            TestKind::Parametric => Box::new(Parametric::default()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Bonferroni => "bonferroni",
            TestKind::Simes => "simes",
            TestKind::Parametric => "parametric",
        }
    }
}

impl FromStr for TestKind {
    type Err = ClosureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bonferroni" | "bonferroni-test" => Ok(TestKind::Bonferroni),
            "simes" | "simes-test" => Ok(TestKind::Simes),
            "parametric" | "parametric-test" => Ok(TestKind::Parametric),
            other => Err(ClosureError::InvalidParameter {
                test: other.to_string(),
                parameter: "test".to_string(),
                reason: "unknown test".to_string(),
            }),
        }
    }
}
