use serde::{Deserialize, Serialize};
use watchpost_core::{DEFAULT_PRINCIPAL, StaticKeyValidator};

/// Which application keys authenticate a debugger session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Principal the keys belong to.
    pub principal: String,
    /// Accepted application keys.
    pub app_keys: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            principal: DEFAULT_PRINCIPAL.to_string(),
            app_keys: Vec::new(),
        }
    }
}

impl AuthSettings {
    /// Key table for the configured principal.
    pub fn validator(&self) -> StaticKeyValidator {
        StaticKeyValidator::for_principal(self.principal.clone(), self.app_keys.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpost_core::CredentialValidator;

    #[test]
    fn default_principal_and_no_keys() {
        let a = AuthSettings::default();
        assert_eq!(a.principal, "Administrator");
        assert!(a.validator().is_empty());
    }

    #[test]
    fn validator_uses_configured_principal() {
        let a = AuthSettings {
            principal: "ops".to_string(),
            app_keys: vec!["k1".to_string(), String::new()],
        };
        let v = a.validator();
        assert_eq!(v.len(), 1);
        assert!(v.credential_exists("ops", "k1"));
        assert!(!v.credential_exists("Administrator", "k1"));
    }
}
