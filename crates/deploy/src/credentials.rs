//! Signer credential loading.

use crate::{config::Environment, error::CredentialError};

/// A secret string whose `Debug` output never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Reads named credentials out of an [`Environment`] snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CredentialLoader<'a> {
    env: &'a Environment,
}

impl<'a> CredentialLoader<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self { env }
    }

    /// Load the credential stored under `variable`.
    ///
    /// Absent and blank entries are both [`CredentialError::Missing`]; there is no retry.
    pub fn load_credential(&self, variable: &str) -> Result<Secret, CredentialError> {
        match self.env.get(variable).map(str::trim) {
            Some(value) if !value.is_empty() => {
                tracing::debug!(variable, "Credential loaded");
                Ok(Secret(value.to_string()))
            }
            _ => Err(CredentialError::Missing {
                variable: variable.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_present_credential() {
        let env: Environment = [("PRIVATE_KEY", "  0xabc  ")].into_iter().collect();
        let secret = CredentialLoader::new(&env).load_credential("PRIVATE_KEY").unwrap();
        assert_eq!(secret.expose(), "0xabc");
    }

    #[test]
    fn test_absent_or_empty_credential_is_missing() {
        let env: Environment = [("EMPTY", ""), ("BLANK", "   ")].into_iter().collect();
        let loader = CredentialLoader::new(&env);

        for variable in ["EMPTY", "BLANK", "UNSET"] {
            assert_eq!(
                loader.load_credential(variable),
                Err(CredentialError::Missing {
                    variable: variable.to_string()
                })
            );
        }
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let env: Environment = [("PRIVATE_KEY", "supersecret")].into_iter().collect();
        let secret = CredentialLoader::new(&env).load_credential("PRIVATE_KEY").unwrap();
        assert!(!format!("{:?}", secret).contains("supersecret"));
    }
}
