//! Migration policies and policy dispatch.
//!
//! Dispatch is a pure function of `(policy, existence state)`, so every
//! one of the twelve combinations can be checked without touching a
//! backend.

use crate::catalog::PhysicalSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a collection's backend schema is brought in line with its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPolicy {
    /// Create the resource if it is missing; never touch an existing one.
    Create,
    /// Never mutate the backend; the resource must already exist.
    Safe,
    /// Converge to the declared schema, carrying existing rows forward.
    #[default]
    Alter,
    /// Destroy and recreate the resource empty.
    Drop,
}

impl MigrationPolicy {
    /// The lowercase policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPolicy::Create => "create",
            MigrationPolicy::Safe => "safe",
            MigrationPolicy::Alter => "alter",
            MigrationPolicy::Drop => "drop",
        }
    }

    /// Check whether this policy may destroy existing rows.
    pub fn is_destructive(&self) -> bool {
        matches!(self, MigrationPolicy::Alter | MigrationPolicy::Drop)
    }
}

impl fmt::Display for MigrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(MigrationPolicy::Create),
            "safe" => Ok(MigrationPolicy::Safe),
            "alter" => Ok(MigrationPolicy::Alter),
            "drop" => Ok(MigrationPolicy::Drop),
            other => Err(format!("unknown migration policy: {other}")),
        }
    }
}

/// What introspection found for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceState {
    /// The resource does not exist, or the adapter cannot tell.
    Missing,
    /// The resource exists with zero attributes.
    EmptyExists,
    /// The resource exists with the given shape.
    Exists(PhysicalSchema),
}

impl ExistenceState {
    /// Classify a `describe` result.
    pub fn classify(described: Option<PhysicalSchema>) -> Self {
        match described {
            None => ExistenceState::Missing,
            Some(schema) if schema.is_empty() => ExistenceState::EmptyExists,
            Some(schema) => ExistenceState::Exists(schema),
        }
    }

    /// Check whether the resource exists.
    pub fn exists(&self) -> bool {
        !matches!(self, ExistenceState::Missing)
    }

    /// The observed physical schema, if the resource exists.
    pub fn physical(&self) -> Option<PhysicalSchema> {
        match self {
            ExistenceState::Missing => None,
            ExistenceState::EmptyExists => Some(PhysicalSchema::new()),
            ExistenceState::Exists(schema) => Some(schema.clone()),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ExistenceState::Missing => "missing",
            ExistenceState::EmptyExists => "empty",
            ExistenceState::Exists(_) => "exists",
        }
    }
}

/// The adapter work a reconciliation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationAction {
    /// Fail with `SchemaNotReady`; no adapter mutation.
    Reject,
    /// Use the observed schema as is; no adapter mutation.
    Accept,
    /// Call `define` only.
    Define,
    /// Call `drop` (absence tolerated), then `define`.
    Recreate,
    /// Run the data preservation protocol.
    Preserve,
}

impl MigrationAction {
    /// Select the action for a policy and existence state.
    pub fn select(policy: MigrationPolicy, existence: &ExistenceState) -> Self {
        use ExistenceState::{EmptyExists, Exists, Missing};

        match (policy, existence) {
            (MigrationPolicy::Safe, Missing) => MigrationAction::Reject,
            (MigrationPolicy::Safe, EmptyExists | Exists(_)) => MigrationAction::Accept,
            (MigrationPolicy::Drop, _) => MigrationAction::Recreate,
            (MigrationPolicy::Create, Missing | EmptyExists) => MigrationAction::Define,
            // Declared/physical divergence is left alone under `create`.
            (MigrationPolicy::Create, Exists(_)) => MigrationAction::Accept,
            (MigrationPolicy::Alter, Missing) => MigrationAction::Define,
            (MigrationPolicy::Alter, EmptyExists | Exists(_)) => MigrationAction::Preserve,
        }
    }

    /// Check whether this action mutates the backend.
    pub fn mutates(&self) -> bool {
        !matches!(self, MigrationAction::Reject | MigrationAction::Accept)
    }
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationAction::Reject => "reject",
            MigrationAction::Accept => "accept",
            MigrationAction::Define => "define",
            MigrationAction::Recreate => "recreate",
            MigrationAction::Preserve => "preserve",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AttributeType;

    fn states() -> [ExistenceState; 3] {
        [
            ExistenceState::Missing,
            ExistenceState::EmptyExists,
            ExistenceState::Exists(PhysicalSchema::new().with_attribute("x", AttributeType::String)),
        ]
    }

    #[test]
    fn test_classify() {
        assert_eq!(ExistenceState::classify(None), ExistenceState::Missing);
        assert_eq!(
            ExistenceState::classify(Some(PhysicalSchema::new())),
            ExistenceState::EmptyExists
        );
        let schema = PhysicalSchema::new().with_attribute("x", AttributeType::String);
        assert_eq!(
            ExistenceState::classify(Some(schema.clone())),
            ExistenceState::Exists(schema)
        );
    }

    #[test]
    fn test_dispatch_table() {
        use MigrationAction::*;

        let expected = [
            // missing, empty, exists
            (MigrationPolicy::Create, [Define, Define, Accept]),
            (MigrationPolicy::Safe, [Reject, Accept, Accept]),
            (MigrationPolicy::Alter, [Define, Preserve, Preserve]),
            (MigrationPolicy::Drop, [Recreate, Recreate, Recreate]),
        ];

        for (policy, actions) in expected {
            for (state, action) in states().iter().zip(actions) {
                assert_eq!(
                    MigrationAction::select(policy, state),
                    action,
                    "{policy} / {}",
                    state.label()
                );
            }
        }
    }

    #[test]
    fn test_safe_and_create_never_destroy() {
        for state in states() {
            for policy in [MigrationPolicy::Safe, MigrationPolicy::Create] {
                let action = MigrationAction::select(policy, &state);
                assert!(!matches!(
                    action,
                    MigrationAction::Recreate | MigrationAction::Preserve
                ));
            }
            assert!(!MigrationAction::select(MigrationPolicy::Safe, &state).mutates());
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("alter".parse::<MigrationPolicy>(), Ok(MigrationPolicy::Alter));
        assert!("migrate".parse::<MigrationPolicy>().is_err());
        let policy: MigrationPolicy = serde_json::from_str("\"safe\"").unwrap();
        assert_eq!(policy, MigrationPolicy::Safe);
        assert_eq!(MigrationPolicy::default(), MigrationPolicy::Alter);
        assert!(MigrationPolicy::Drop.is_destructive());
        assert!(!MigrationPolicy::Create.is_destructive());
    }

    #[test]
    fn test_existence_physical() {
        assert_eq!(ExistenceState::Missing.physical(), None);
        assert_eq!(ExistenceState::EmptyExists.physical(), Some(PhysicalSchema::new()));
        assert!(!ExistenceState::Missing.exists());
        assert!(ExistenceState::EmptyExists.exists());
    }
}
