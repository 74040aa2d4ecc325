//! Error type shared by every stage of a karstolution run.
use thiserror::Error;

/// Custom error type for the karstolution crate.
///
/// Every fatal variant carries the step index (1-based, as in the forcing `tt` column)
/// and the offending value, so that a failed run can be reproduced from its inputs.
#[derive(Debug, Error)]
pub enum KarstError {
    /// A required configuration key is absent.
    #[error("missing configuration key `{key}`")]
    MissingConfigKey {
        /// Dotted path of the missing key, e.g. `monthly_forcing.cave_pco2`.
        key: String,
    },
    /// A configuration value failed a type or range check.
    #[error("invalid value {value} for configuration key `{key}`: {reason}")]
    InvalidConfigValue {
        /// Dotted path of the key.
        key: String,
        /// The offending value, rendered for display.
        value: String,
        /// What the value should have been.
        reason: String,
    },
    /// A step index past the end of the forcing series was requested.
    #[error("forcing exhausted: index {index} requested but the series has {len} steps")]
    ForcingExhausted {
        /// Requested 1-based index.
        index: usize,
        /// Length of the series.
        len: usize,
    },
    /// A calendar month outside 1-12.
    #[error("invalid month {month} at step {step}")]
    InvalidMonth {
        /// Step index of the record carrying the month (0 when looked up directly).
        step: usize,
        /// The month value.
        month: i64,
    },
    /// A forcing record failed validation.
    #[error("invalid forcing at step {step}: {reason}")]
    InvalidForcing {
        /// Step index of the offending record.
        step: usize,
        /// Description of the violation.
        reason: String,
    },
    /// A store's water balance went negative.
    #[error("store `{store}` went negative ({content} mm) at step {step}")]
    NegativeStorage {
        /// Step index at which the balance failed.
        step: usize,
        /// Name of the store.
        store: &'static str,
        /// Content after the step.
        content: f64,
    },
    /// Degenerate cave-air or drip inputs to the fractionation model.
    #[error("invalid cave climate at step {step}: {reason}")]
    InvalidCaveClimate {
        /// Step index.
        step: usize,
        /// Description of the degenerate input, with its value.
        reason: String,
    },
    /// Error type from csv crate.
    #[error("could not serialize/deserialize csv file: {0}")]
    Csv(#[from] csv::Error),
    /// Error type from std::io.
    #[error("could not read file from path provided: {0}")]
    Io(#[from] std::io::Error),
    /// Error type from toml crate.
    #[error("could not parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl KarstError {
    /// Shorthand for [`KarstError::InvalidConfigValue`].
    pub fn invalid_config(key: &str, value: impl std::fmt::Display, reason: &str) -> Self {
        KarstError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`KarstError::InvalidCaveClimate`].
    pub fn cave_climate(step: usize, reason: impl Into<String>) -> Self {
        KarstError::InvalidCaveClimate {
            step,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_step_and_value() {
        let e = KarstError::NegativeStorage {
            step: 17,
            store: "epikarst",
            content: -0.25,
        };
        let msg = e.to_string();
        assert!(msg.contains("17"));
        assert!(msg.contains("epikarst"));
        assert!(msg.contains("-0.25"));
    }

    #[test]
    fn invalid_config_shorthand() {
        let e = KarstError::invalid_config("f1", 1.5, "must lie in [0, 1]");
        match e {
            KarstError::InvalidConfigValue { key, value, .. } => {
                assert_eq!(key, "f1");
                assert_eq!(value, "1.5");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
