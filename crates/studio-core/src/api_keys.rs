//! Upstream provider credentials managed through the studio API.
//!
//! The API never returns stored keys in clear; reads carry masked values.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Keys and endpoints to store. Unset fields are left unchanged upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeysForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langflow_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langflow_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastgpt_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastgpt_base_url: Option<String>,
}

impl ApiKeysForm {
    /// The API only accepts updates that carry a Langflow key or base URL.
    pub fn validate(&self) -> Result<(), CoreError> {
        if is_set(&self.langflow_api_key) || is_set(&self.langflow_base_url) {
            Ok(())
        } else {
            Err(CoreError::validation(
                "at least one API setting is required (langflow api key or base url)",
            ))
        }
    }
}

fn is_set(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Stored configuration as reported by the API, keys masked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    #[serde(default)]
    pub langflow_api_key_masked: Option<String>,
    #[serde(default)]
    pub langflow_base_url: Option<String>,
    #[serde(default)]
    pub fastgpt_api_key_masked: Option<String>,
    #[serde(default)]
    pub fastgpt_base_url: Option<String>,
}

impl ApiKeysConfig {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Masks a key the way the API does: first and last four characters kept
/// for keys longer than eight, everything masked otherwise.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
    } else {
        "*".repeat(chars.len())
    }
}
