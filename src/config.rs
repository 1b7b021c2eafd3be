//! Configuration for the anchoring engine

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchConfig,
    pub overlay: OverlayConfig,
    pub search: SearchConfig,
    /// Window over which overlay input changes are coalesced
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Extra chars searched around a match when looking for its stored context
    pub context_slack_chars: usize,
    /// Shortest folded text accepted by containment (rather than equality) verification
    pub min_containment_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// CSS class prefix for highlight decorations
    pub class_prefix: String,
    /// Class added to the emphasized (active) annotation
    pub active_class: String,
    /// Class used for search match decorations
    pub search_class: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Stop collecting once this many results are found
    pub max_results: usize,
    /// Chars of context on each side of a match in the excerpt
    pub excerpt_context_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            matching: MatchConfig::default(),
            overlay: OverlayConfig::default(),
            search: SearchConfig::default(),
            debounce_ms: 150,
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            context_slack_chars: 24,
            min_containment_chars: 12,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            class_prefix: "ll-highlight".to_string(),
            active_class: "ll-highlight-active".to_string(),
            search_class: "ll-search-match".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_results: 500,
            excerpt_context_chars: 50,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the environment, falling back to defaults per field
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            matching: MatchConfig {
                context_slack_chars: env_or("ANCHOR_CONTEXT_SLACK", defaults.matching.context_slack_chars),
                min_containment_chars: env_or("ANCHOR_MIN_CONTAINMENT", defaults.matching.min_containment_chars),
            },
            overlay: OverlayConfig {
                class_prefix: env::var("ANCHOR_CLASS_PREFIX").unwrap_or(defaults.overlay.class_prefix),
                ..defaults.overlay
            },
            search: SearchConfig {
                max_results: env_or("ANCHOR_SEARCH_MAX_RESULTS", defaults.search.max_results),
                excerpt_context_chars: env_or("ANCHOR_EXCERPT_CHARS", defaults.search.excerpt_context_chars),
            },
            debounce_ms: env_or("ANCHOR_DEBOUNCE_MS", defaults.debounce_ms),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(150));
        assert_eq!(config.matching.min_containment_chars, 12);
        assert_eq!(config.overlay.class_prefix, "ll-highlight");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"debounce_ms": 40, "search": {"max_results": 3}}"#).unwrap();
        assert_eq!(config.debounce_ms, 40);
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.search.excerpt_context_chars, 50);
        assert_eq!(config.matching.context_slack_chars, 24);
    }

    #[test]
    fn test_env_or_ignores_garbage() {
        assert_eq!(env_or("ANCHOR_TEST_UNSET_VARIABLE", 7usize), 7);
    }
}
