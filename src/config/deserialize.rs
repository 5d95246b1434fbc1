// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Enforces a non-empty scenario list with unique names.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use crate::lifecycle::Scenario;

pub fn deserialize_scenarios<'de, D>(deserializer: D) -> Result<NonEmpty<Scenario>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let scenarios: Vec<Scenario> = Vec::deserialize(deserializer)?;

    let mut seen = HashSet::new();
    for scenario in &scenarios {
        if !seen.insert(scenario.name.as_str()) {
            return Err(serde::de::Error::custom(format!(
                "duplicate scenario name '{}'",
                scenario.name
            )));
        }
    }

    NonEmpty::from_vec(scenarios)
        .ok_or_else(|| serde::de::Error::custom("at least one scenario is required"))
}
