use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Policy name applied when no identity-specific policy matches.
    #[serde(default = "d_default_policy")]
    pub default_policy: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_policy: d_default_policy(),
        }
    }
}

fn d_default_policy() -> String {
    "deny".into()
}
