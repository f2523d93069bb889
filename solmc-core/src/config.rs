#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDRESS_COUNT: u64 = 5;

/// Knobs of the verification model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TranslationConfig {
    /// Block number and timestamp advance together.
    pub lockstep_time: bool,

    /// Number of distinguishable addresses, constants and actors included.
    #[serde(rename = "addresses")]
    pub address_count: u64,

    /// Explicit actor model by contract name. `None` models one instance of
    /// every contract.
    pub actors: Option<Vec<String>>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            lockstep_time: false,
            address_count: DEFAULT_ADDRESS_COUNT,
            actors: None,
        }
    }
}
