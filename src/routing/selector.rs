use serde::{Deserialize, Deserializer, Serialize};

use crate::error::BridgeError;
use crate::protocol::relay::FeatureFlag;

/// Which relay tier(s) may serve a request, plus required capabilities.
///
/// Callers pass it JSON-encoded in the OpenAI `model` field, e.g.
/// `{"tier_selector": ">2", "flags": ["tool-use"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelector {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tier_selector: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Vec<String>,
}

/// An explicit `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ModelSelector {
    /// Wire feature flags in fixed order; unknown flag strings are dropped.
    #[must_use]
    pub fn feature_flags(&self) -> Vec<FeatureFlag> {
        [
            FeatureFlag::Image,
            FeatureFlag::ToolCalls,
            FeatureFlag::Uncensored,
        ]
        .into_iter()
        .filter(|wanted| {
            self.flags
                .iter()
                .any(|flag| FeatureFlag::from_selector_flag(flag) == Some(*wanted))
        })
        .collect()
    }
}

/// Parse the raw `model` field. Absent or empty means "any tier, no flags".
///
/// # Errors
///
/// Returns [`BridgeError::InvalidSelector`] when `raw` is present but is not a
/// JSON-encoded selector object.
pub fn parse_selector(raw: Option<&str>) -> Result<ModelSelector, BridgeError> {
    match raw {
        None | Some("") => Ok(ModelSelector::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| BridgeError::InvalidSelector(format!("{raw:?}: {e}"))),
    }
}

/// Check the tier selector grammar.
///
/// Accepted shapes: empty, `{1,2,3}`, `>N`, `>=N`, `<N`, `<=N`, `N`.
#[must_use]
pub fn validate_tier_selector(selector: &str) -> bool {
    if selector.is_empty() {
        return true;
    }

    if let Some(inner) = selector
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    {
        return inner.split(',').all(|value| is_integer(value.trim()));
    }

    for op in [">=", "<=", ">", "<"] {
        if let Some(rest) = selector.strip_prefix(op) {
            return is_integer(rest);
        }
    }

    is_integer(selector)
}

/// Digit shape only; magnitude is the relay's concern.
fn is_integer(value: &str) -> bool {
    let digits = value
        .strip_prefix(['+', '-'])
        .unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_grammar_shapes() {
        for selector in [
            "", "3", "{1,2,3}", "{ 1, 2 }", "{7}", ">2", ">=2", "<4", "<=10", "-1",
            "99999999999999999999", ">=123456789012345678901234567890",
        ] {
            assert!(validate_tier_selector(selector), "{selector:?}");
        }
    }

    #[test]
    fn test_rejects_other_shapes() {
        for selector in [
            "{}", "{1,,2}", "{a}", ">", ">=", "=>2", "abc", "3x", " 3", "1,2", "{1,2", "<>3",
            ">=2.5", "==2", "+", "-", "{1,-}",
        ] {
            assert!(!validate_tier_selector(selector), "{selector:?}");
        }
    }

    #[test]
    fn test_parse_selector_defaults_when_absent() {
        assert_eq!(parse_selector(None).unwrap(), ModelSelector::default());
        assert_eq!(parse_selector(Some("")).unwrap(), ModelSelector::default());
    }

    #[test]
    fn test_parse_selector_json() {
        let selector =
            parse_selector(Some(r#"{"tier_selector":"<4","flags":["vision"]}"#)).unwrap();
        assert_eq!(selector.tier_selector, "<4");
        assert_eq!(selector.flags, vec!["vision".to_string()]);

        let partial = parse_selector(Some(r#"{"flags":["tool-use"]}"#)).unwrap();
        assert_eq!(partial.tier_selector, "");
    }

    #[test]
    fn test_parse_selector_null_fields_mean_defaults() {
        let selector = parse_selector(Some(r#"{"tier_selector":null,"flags":null}"#)).unwrap();
        assert_eq!(selector, ModelSelector::default());

        let selector = parse_selector(Some(r#"{"tier_selector":">=2","flags":null}"#)).unwrap();
        assert_eq!(selector.tier_selector, ">=2");
        assert!(selector.flags.is_empty());
    }

    #[test]
    fn test_parse_selector_rejects_plain_model_name() {
        let err = parse_selector(Some("gpt-4o")).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSelector(_)));
    }

    #[test]
    fn test_feature_flags_mapping_drops_unknown() {
        let selector = ModelSelector {
            tier_selector: String::new(),
            flags: vec![
                "uncensored".to_string(),
                "telepathy".to_string(),
                "vision".to_string(),
                "vision".to_string(),
            ],
        };
        assert_eq!(
            selector.feature_flags(),
            vec![FeatureFlag::Image, FeatureFlag::Uncensored]
        );
    }
}
