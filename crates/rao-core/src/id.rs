//! Identifier newtypes for catalog entities.
//!
//! All catalog objects (remedial actions, monitored elements, operators,
//! generators, alignment groups, contingencies, network elements) are
//! referenced by string identifiers. Wrapping them in newtypes keeps the
//! composite semantic keys of the linear problem self-describing and
//! prevents mixing, say, an action id with a network element id.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a remedial action.
    ActionId
);
string_id!(
    /// Identifier of a monitored flow element (CNEC).
    CnecId
);
string_id!(
    /// Identifier of an operator (TSO) owning actions and elements.
    TsoId
);
string_id!(
    /// Identifier of a dispatchable generator.
    GeneratorId
);
string_id!(
    /// Identifier of an alignment group of ganged actions.
    GroupId
);
string_id!(
    /// Identifier of a contingency scenario.
    ContingencyId
);
string_id!(
    /// Identifier of a physical network element (branch, transformer, unit).
    NetworkElementId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = ActionId::from("pst_be_1");
        assert_eq!(id.as_str(), "pst_be_1");
        assert_eq!(id.to_string(), "pst_be_1");
        assert_eq!(id, ActionId("pst_be_1".to_string()));
    }

    #[test]
    fn test_ids_are_ordered() {
        let mut ids = vec![CnecId::from("b"), CnecId::from("a"), CnecId::from("c")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
        assert_eq!(ids[2].as_str(), "c");
    }

    #[test]
    fn test_serde_transparent() {
        let id = TsoId::from("rte");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"rte\"");
    }
}
