//! Role gate for administrative intents.
//!
//! The gate is consulted at every privileged step. Holding a decoded intent
//! never implies the check already passed.

use thiserror::Error;

/// Returned when the actor lacks the privileged role.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing required role {role:?}")]
pub struct AccessDenied {
    /// Role the actor would have needed
    pub role: String,
}

/// Allows actors holding one designated role name (exact match).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleGate {
    role: String,
}

impl RoleGate {
    /// Create a gate for the given role name.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }

    /// The designated role name.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Check the actor's role names for the designated role.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when no role name matches exactly.
    pub fn check<S: AsRef<str>>(&self, role_names: &[S]) -> Result<(), AccessDenied> {
        if role_names.iter().any(|name| name.as_ref() == self.role) {
            Ok(())
        } else {
            Err(AccessDenied {
                role: self.role.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_required() {
        let gate = RoleGate::new(".");
        assert!(gate.check(&["Member", "."]).is_ok());
        assert!(gate.check(&["..", " . ", "Staff"]).is_err());
        assert!(gate.check::<&str>(&[]).is_err());
    }

    #[test]
    fn test_denial_names_the_role() {
        let gate = RoleGate::new("Staff");
        assert_eq!(
            gate.check(&["staff".to_string()]),
            Err(AccessDenied {
                role: "Staff".to_string()
            })
        );
    }
}
