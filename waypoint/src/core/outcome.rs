//! Handler outcome type.

use serde_json::Value;

/// What a stage handler asks the engine to do next.
///
/// Both variants carry the value persisted as the stage's result. They
/// differ only in how the engine's fold proceeds.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Feed the value into the next stage.
    Continue(Value),
    /// Stop this invocation and return the value; later stages run on the
    /// next call with the same run id.
    Pause(Value),
}

impl Outcome {
    /// Creates a continue outcome.
    #[must_use]
    pub fn next(value: impl Into<Value>) -> Self {
        Self::Continue(value.into())
    }

    /// Creates a pause outcome.
    #[must_use]
    pub fn pause(value: impl Into<Value>) -> Self {
        Self::Pause(value.into())
    }

    /// Returns the carried value.
    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Continue(value) | Self::Pause(value) => value,
        }
    }

    /// Consumes the outcome and returns the carried value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Continue(value) | Self::Pause(value) => value,
        }
    }

    /// Returns true for a pause outcome.
    #[must_use]
    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Pause(_))
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::Continue(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_value() {
        let next = Outcome::next("a");
        let pause = Outcome::pause(json!({"k": 1}));

        assert_eq!(next.value(), &json!("a"));
        assert!(!next.is_pause());
        assert!(pause.is_pause());
        assert_eq!(pause.into_value(), json!({"k": 1}));
    }

    #[test]
    fn test_outcome_from_value_continues() {
        let outcome: Outcome = json!(3).into();
        assert_eq!(outcome, Outcome::Continue(json!(3)));
    }
}
