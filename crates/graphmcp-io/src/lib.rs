use graphmcp_closure::{closed_test, ClosureConfig, ClosureResult};
use graphmcp_core::{ClosureError, Graph, GraphModel, TestParams, F};
use graphmcp_tests::TestKind;
use serde::{Deserialize, Deserializer};
use std::path::Path;

pub mod cli;
pub mod render;
pub use cli::*;

/// Everything needed for one closed-test run, as read from a JSON file.
///
/// ```json
/// {
///   "model": { "weights": [0.5, 0.5], "transition": [[0, 1], [1, 0]] },
///   "pvalues": [0.01, 0.04],
///   "test": "bonferroni",
///   "alpha": 0.025
/// }
/// ```
///
/// `model` is either a bare graph or a tagged `{"simple": …}` /
/// `{"entangled": {"graphs": […], "split": […]}}` model.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    #[serde(deserialize_with = "deserialize_model")]
    pub model: Option<GraphModel>,
    pub pvalues: Vec<F>,
    pub test: TestKind,
    pub params: TestParams,
    pub alpha: Option<F>,
    pub epsilon: Option<F>,
    pub upscale: Option<bool>,
    pub verbose: Option<bool>,
    pub adjusted: Option<bool>,
    pub parallel: Option<bool>,
}

impl RunConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let run = serde_json::from_str(&json)?;
        Ok(run)
    }

    pub fn closure_config(&self) -> ClosureConfig {
        let defaults = ClosureConfig::default();
        ClosureConfig {
            alpha: self.alpha.unwrap_or(defaults.alpha),
            epsilon: self.epsilon.unwrap_or(defaults.epsilon),
            upscale: self.upscale.unwrap_or(defaults.upscale),
            verbose: self.verbose.unwrap_or(defaults.verbose),
            adjusted: self.adjusted.unwrap_or(defaults.adjusted),
            parallel: self.parallel.unwrap_or(defaults.parallel),
        }
    }

    /// Run the configured closed test.
    pub fn execute(&self) -> anyhow::Result<ClosureResult> {
        let model = self.model.as_ref().ok_or_else(|| {
            anyhow::anyhow!("no graph given (set \"model\" in the run file or pass --graph)")
        })?;
        let test = self.test.build();
        let config = self.closure_config();
        let result = closed_test(model, &self.pvalues, test.as_ref(), &self.params, &config)?;
        Ok(result)
    }
}

fn deserialize_model<'de, D: Deserializer<'de>>(d: D) -> Result<Option<GraphModel>, D::Error> {
    Option::<serde_json::Value>::deserialize(d)?
        .map(model_from_value)
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Bare graphs are accepted where a tagged model is expected.
pub fn model_from_value(value: serde_json::Value) -> serde_json::Result<GraphModel> {
    if value.get("simple").is_some() || value.get("entangled").is_some() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<Graph>(value).map(GraphModel::from)
    }
}

pub fn load_model(path: impl AsRef<Path>) -> anyhow::Result<GraphModel> {
    let json = std::fs::read_to_string(path.as_ref())?;
    Ok(model_from_value(serde_json::from_str(&json)?)?)
}

/// Index of the hypothesis called `name`.
pub fn node_index(model: &GraphModel, name: &str) -> Result<usize, ClosureError> {
    model
        .names()
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| ClosureError::UnknownNode { name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmcp_core::ParamValue;

    const HOLM: &str = r#"{
        "model": {
            "weights": [0.5, 0.5, 0, 0],
            "transition": [
                [0, "1/3", "1/3", "1/3"],
                [0.3333333333333333, 0, 0.3333333333333333, 0.3333333333333333],
                [0.3333333333333333, 0.3333333333333333, 0, 0.3333333333333333],
                [0.3333333333333333, 0.3333333333333333, 0.3333333333333333, 0]
            ]
        },
        "pvalues": [0.01, 0.02, 0.04, 0.04]
    }"#;

    #[test]
    fn test_bad_weight_is_reported() {
        // "1/3" is not a weight expression
        let err = serde_json::from_str::<RunConfig>(HOLM).unwrap_err();
        assert!(err.to_string().contains("1/3"), "{}", err);
    }

    #[test]
    fn test_bare_graph_run() {
        let json = HOLM.replace("\"1/3\"", "0.3333333333333333");
        let run: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(run.test, TestKind::Bonferroni);
        assert_eq!(run.closure_config(), ClosureConfig::default());
        let res = run.execute().unwrap();
        assert_eq!(res.rejected_names(), vec!["H1", "H2"]);
    }

    #[test]
    fn test_entangled_run_with_overrides() {
        let json = r#"{
            "model": {"entangled": {
                "graphs": [
                    {"weights": [1, 0], "transition": [[0, 1], [1, 0]]},
                    {"weights": [0, 1], "transition": [[0, "eps"], ["1-eps", 0]]}
                ],
                "split": [0.5, 0.5]
            }},
            "pvalues": [0.02, 0.01],
            "test": "simes",
            "alpha": 0.025,
            "epsilon": 0.01,
            "adjusted": false,
            "params": {"unused": 1.0}
        }"#;
        let run: RunConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(run.model, Some(GraphModel::Entangled(_))));
        assert_eq!(run.test, TestKind::Simes);
        assert_eq!(run.params.get("unused"), Some(&ParamValue::Scalar(1.0)));
        let config = run.closure_config();
        assert_eq!((config.alpha, config.epsilon, config.adjusted), (0.025, 0.01, false));

        let res = run.execute().unwrap();
        assert_eq!(res.warnings().len(), 1);
        assert!(res.adjusted_pvalues().iter().all(Option::is_none));
    }

    #[test]
    fn test_missing_model() {
        let run: RunConfig = serde_json::from_str(r#"{"pvalues": [0.1]}"#).unwrap();
        assert!(run.execute().is_err());
    }

    #[test]
    fn test_node_index() {
        let model = model_from_value(serde_json::json!({
            "names": ["A", "B"], "weights": [0.5, 0.5], "transition": [[0, 1], [1, 0]]
        }))
        .unwrap();
        assert_eq!(node_index(&model, "B").unwrap(), 1);
        assert_eq!(
            node_index(&model, "H1").unwrap_err(),
            ClosureError::UnknownNode { name: "H1".to_string() }
        );
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("graphmcp-run-{}.json", std::process::id()));
        std::fs::write(&path, HOLM.replace("\"1/3\"", "0.3333333333333333")).unwrap();
        let run = RunConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(run.pvalues, vec![0.01, 0.02, 0.04, 0.04]);
        assert_eq!(run.model.unwrap().num_nodes(), 4);
    }
}
