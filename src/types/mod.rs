// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent mixing deployment, target, and operation references.

mod age;
mod id;
mod scenario_name;

pub use age::{AgeParseError, AgeThreshold, AgeUnit};
pub use id::{DeploymentId, Id, OperationRef, TargetRef};
pub use scenario_name::{ScenarioName, ScenarioNameError};
