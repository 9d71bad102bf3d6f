//! Identity and declared policy shared by every strategy.

use agentweave_core::UnitPolicy;

/// Name, description, master flag and call policy of one unit.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub is_master: bool,
    pub policy: UnitPolicy,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Builder methods every strategy exposes over its [`Profile`].
macro_rules! profile_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.profile.description = description.into();
                self
            }

            pub fn with_policy(mut self, policy: agentweave_core::UnitPolicy) -> Self {
                self.profile.policy = policy;
                self
            }

            /// Mark this unit as the router's entry point.
            pub fn as_master(mut self) -> Self {
                self.profile.is_master = true;
                self
            }

            pub fn profile(&self) -> &$crate::patterns::profile::Profile {
                &self.profile
            }
        }
    };
}

/// The identity half of `Unit` for a type with a `profile` field.
macro_rules! unit_identity {
    () => {
        fn name(&self) -> &str {
            &self.profile.name
        }

        fn description(&self) -> &str {
            &self.profile.description
        }

        fn is_master(&self) -> bool {
            self.profile.is_master
        }

        fn policy(&self) -> &agentweave_core::UnitPolicy {
            &self.profile.policy
        }
    };
}

pub(crate) use profile_builders;
pub(crate) use unit_identity;
