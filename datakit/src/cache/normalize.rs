use config::shared::KeyNormalizationConfig;

use crate::types::JoinKey;

/// Rewrites text key parts before they are stored and before they are looked up.
///
/// Non-text parts are left untouched. The same normalization is applied on both sides of the
/// join, so a cache built from `"sw1a 1aa"` answers lookups for `"SW1A-1AA"` under
/// [`KeyNormalization::Compact`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyNormalization {
    #[default]
    None,
    /// Removes spaces and dashes, then uppercases.
    Compact,
    /// Keeps the first whitespace separated token, uppercased.
    FirstToken,
    /// Uppercases and keeps the first `n` characters.
    Prefix(usize),
}

impl KeyNormalization {
    pub fn apply(&self, value: &str) -> String {
        match self {
            KeyNormalization::None => value.to_string(),
            KeyNormalization::Compact => value
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect::<String>()
                .to_uppercase(),
            KeyNormalization::FirstToken => value
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_uppercase(),
            KeyNormalization::Prefix(length) => {
                value.trim().to_uppercase().chars().take(*length).collect()
            }
        }
    }

    pub fn normalize(&self, key: JoinKey) -> JoinKey {
        match self {
            KeyNormalization::None => key,
            normalization => key.map_text(|value| normalization.apply(value)),
        }
    }
}

impl From<KeyNormalizationConfig> for KeyNormalization {
    fn from(config: KeyNormalizationConfig) -> Self {
        match config {
            KeyNormalizationConfig::None => KeyNormalization::None,
            KeyNormalizationConfig::Compact => KeyNormalization::Compact,
            KeyNormalizationConfig::FirstToken => KeyNormalization::FirstToken,
            KeyNormalizationConfig::Prefix { length } => KeyNormalization::Prefix(length),
        }
    }
}
