use crate::{ClosureError, F};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Node or edge weight, either a plain number or a linear form `a + b·ε`
/// in an infinitesimal ε.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeightRepr", into = "WeightRepr")]
pub enum Weight {
    Value(F),
    Epsilon { constant: F, coefficient: F },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WeightRepr {
    Number(F),
    Text(String),
}

impl Weight {
    pub const ZERO: Weight = Weight::Value(0.0);

    /// The bare infinitesimal `ε`.
    pub fn eps() -> Self {
        Weight::Epsilon { constant: 0.0, coefficient: 1.0 }
    }

    /// `constant + coefficient·ε`, collapsing to a plain value when the ε part vanishes.
    pub fn linear(constant: F, coefficient: F) -> Self {
        if coefficient == 0.0 {
            Weight::Value(constant)
        } else {
            Weight::Epsilon { constant, coefficient }
        }
    }

    /// Numeric value at the given ε.
    pub fn value(&self, eps: F) -> F {
        match *self {
            Weight::Value(v) => v,
            Weight::Epsilon { constant, coefficient } => constant + coefficient * eps,
        }
    }

    /// Replace the ε form by its value at `eps`, clamped into [0, 1].
    /// Plain values pass through untouched.
    pub fn substitute(&self, eps: F) -> Self {
        match self {
            Weight::Value(_) => *self,
            Weight::Epsilon { .. } => Weight::Value(self.value(eps).clamp(0.0, 1.0)),
        }
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self, Weight::Epsilon { .. })
    }

    /// Structurally absent: a plain zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Weight::Value(v) if *v == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Weight::Value(v) => v.is_finite(),
            Weight::Epsilon { constant, coefficient } => {
                constant.is_finite() && coefficient.is_finite()
            }
        }
    }

    /// Negative for all sufficiently small ε > 0.
    pub fn is_negative(&self) -> bool {
        match *self {
            Weight::Value(v) => v < 0.0,
            Weight::Epsilon { constant, coefficient } => {
                constant < 0.0 || (constant == 0.0 && coefficient < 0.0)
            }
        }
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::ZERO
    }
}

impl From<F> for Weight {
    fn from(v: F) -> Self {
        Weight::Value(v)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Weight::Value(v) => write!(f, "{}", v),
            Weight::Epsilon { constant, coefficient } => {
                let sign = if coefficient < 0.0 { "-" } else { "+" };
                let magnitude = coefficient.abs();
                if constant != 0.0 {
                    write!(f, "{}{}", constant, sign)?;
                } else if coefficient < 0.0 {
                    write!(f, "-")?;
                }
                if magnitude != 1.0 {
                    write!(f, "{}", magnitude)?;
                }
                write!(f, "eps")
            }
        }
    }
}

impl FromStr for Weight {
    type Err = ClosureError;

    /// Accepts numbers and sums of terms such as `eps`, `1-eps`, `0.5+2eps`,
    /// `0.25*ε` or `\epsilon`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| ClosureError::WeightParse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let text: String = input
            .replace("\\epsilon", "eps")
            .replace("epsilon", "eps")
            .replace('ε', "eps")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if text.is_empty() {
            return Err(fail("empty expression"));
        }

        let mut constant = 0.0;
        let mut coefficient = 0.0;
        for term in split_terms(&text) {
            if let Some(head) = term.strip_suffix("eps") {
                let head = head.strip_suffix('*').unwrap_or(head);
                let c = match head {
                    "" | "+" => 1.0,
                    "-" => -1.0,
                    _ => head.parse::<F>().map_err(|_| fail("bad epsilon coefficient"))?,
                };
                coefficient += c;
            } else {
                constant += term.parse::<F>().map_err(|_| fail("bad numeric term"))?;
            }
        }

        let w = Weight::linear(constant, coefficient);
        if !w.is_finite() {
            return Err(fail("not finite"));
        }
        Ok(w)
    }
}

/// Split at top-level `+`/`-`, keeping the sign with its term and leaving
/// exponents such as `1e-3` intact.
fn split_terms(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut terms = Vec::new();
    let mut start = 0;
    for i in 1..bytes.len() {
        if bytes[i] != b'+' && bytes[i] != b'-' {
            continue;
        }
        let prev = bytes[i - 1];
        let exponent = (prev == b'e' || prev == b'E')
            && i >= 2
            && (bytes[i - 2].is_ascii_digit() || bytes[i - 2] == b'.');
        if exponent || prev == b'*' {
            continue;
        }
        terms.push(&text[start..i]);
        start = i;
    }
    terms.push(&text[start..]);
    terms
}

impl TryFrom<WeightRepr> for Weight {
    type Error = ClosureError;

    fn try_from(repr: WeightRepr) -> Result<Self, Self::Error> {
        match repr {
            WeightRepr::Number(v) => Ok(Weight::Value(v)),
            WeightRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Weight> for WeightRepr {
    fn from(w: Weight) -> Self {
        match w {
            Weight::Value(v) => WeightRepr::Number(v),
            eps => WeightRepr::Text(eps.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_epsilon() {
        assert_eq!("0.5".parse::<Weight>().unwrap(), Weight::Value(0.5));
        assert_eq!("1e-3".parse::<Weight>().unwrap(), Weight::Value(1e-3));
        assert_eq!("eps".parse::<Weight>().unwrap(), Weight::eps());
        assert_eq!("ε".parse::<Weight>().unwrap(), Weight::eps());
        assert_eq!("\\epsilon".parse::<Weight>().unwrap(), Weight::eps());
        assert_eq!(
            "1 - eps".parse::<Weight>().unwrap(),
            Weight::Epsilon { constant: 1.0, coefficient: -1.0 }
        );
        assert_eq!(
            "0.5+2*eps".parse::<Weight>().unwrap(),
            Weight::Epsilon { constant: 0.5, coefficient: 2.0 }
        );
        assert_eq!("eps-eps+0.25".parse::<Weight>().unwrap(), Weight::Value(0.25));
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Weight>().is_err());
        assert!("abc".parse::<Weight>().is_err());
        assert!("2x*eps".parse::<Weight>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["eps", "1-eps", "0.5+2eps", "-eps", "0.25"] {
            let w: Weight = text.parse().unwrap();
            assert_eq!(w.to_string(), text);
            assert_eq!(w.to_string().parse::<Weight>().unwrap(), w);
        }
    }

    #[test]
    fn test_substitute_is_idempotent() {
        let w = Weight::Epsilon { constant: 1.0, coefficient: -1.0 };
        let once = w.substitute(1e-3);
        assert_eq!(once, Weight::Value(1.0 - 1e-3));
        assert_eq!(once.substitute(1e-3), once);
        assert_eq!(once.substitute(0.2), once);
    }

    #[test]
    fn test_sign_at_small_epsilon() {
        assert!(!Weight::eps().is_negative());
        assert!(Weight::linear(0.0, -1.0).is_negative());
        assert!(!Weight::linear(1.0, -5.0).is_negative());
        assert!(Weight::Value(-0.1).is_negative());
    }

    #[test]
    fn test_serde_forms() {
        let ws: Vec<Weight> = serde_json::from_str(r#"[0.5, "eps", "1-eps"]"#).unwrap();
        assert_eq!(ws[0], Weight::Value(0.5));
        assert_eq!(ws[1], Weight::eps());
        let back = serde_json::to_string(&ws).unwrap();
        assert_eq!(back, r#"[0.5,"eps","1-eps"]"#);
    }
}
