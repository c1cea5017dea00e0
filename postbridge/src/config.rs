use postbridge_core::DEFAULT_MAX_FRAME_LEN;
use std::time::Duration;

/// Bridge engine configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Name recorded on log spans, e.g. `"host"` or `"page"`
    pub name: String,
    /// Inbound frames longer than this are dropped as malformed
    pub max_frame_len: usize,
    /// Bound used by `call_with_default_timeout`; `None` waits forever
    pub default_timeout: Option<Duration>,
}

impl BridgeConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: "bridge".to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            default_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.name, "bridge");
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert!(config.default_timeout.is_none());
    }

    #[test]
    fn test_named() {
        let config = BridgeConfig::named("page");
        assert_eq!(config.name, "page");
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }
}
