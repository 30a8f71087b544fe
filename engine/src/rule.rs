//! Rule types: a single match pattern plus its type and action.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a rule's pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    #[serde(rename = "domain")]
    Domain,
    #[serde(rename = "domain-suffix")]
    DomainSuffix,
    #[serde(rename = "domain-match")]
    DomainMatch,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "url-match")]
    UrlMatch,
    #[serde(rename = "ip-cidr")]
    IpCidr,
    #[serde(rename = "geoip")]
    GeoIp,
    #[serde(rename = "final")]
    Final,
}

impl RuleType {
    /// All known rule types.
    pub const ALL: [RuleType; 8] = [
        RuleType::Domain,
        RuleType::DomainSuffix,
        RuleType::DomainMatch,
        RuleType::Url,
        RuleType::UrlMatch,
        RuleType::IpCidr,
        RuleType::GeoIp,
        RuleType::Final,
    ];

    /// The string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Domain => "domain",
            RuleType::DomainSuffix => "domain-suffix",
            RuleType::DomainMatch => "domain-match",
            RuleType::Url => "url",
            RuleType::UrlMatch => "url-match",
            RuleType::IpCidr => "ip-cidr",
            RuleType::GeoIp => "geoip",
            RuleType::Final => "final",
        }
    }
}

impl FromStr for RuleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// What happens to traffic matching a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Direct,
    Proxy,
    Reject,
}

impl RuleAction {
    /// The string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Direct => "direct",
            RuleAction::Proxy => "proxy",
            RuleAction::Reject => "reject",
        }
    }
}

impl FromStr for RuleAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(RuleAction::Direct),
            "proxy" => Ok(RuleAction::Proxy),
            "reject" => Ok(RuleAction::Reject),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A wire string that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// A single traffic-matching rule.
///
/// Rules are immutable values: they are only ever built from a complete
/// `(type, action, value)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "type")]
    rule_type: RuleType,
    action: RuleAction,
    value: String,
}

impl Rule {
    /// Create a rule from its three parts.
    pub fn new(rule_type: RuleType, action: RuleAction, value: impl Into<String>) -> Self {
        Self {
            rule_type,
            action,
            value: value.into(),
        }
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    /// The match pattern.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Renders the rule as a config line, e.g. `DOMAIN-SUFFIX,ads.com,REJECT`.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.rule_type.as_str().to_ascii_uppercase();
        let action = self.action.as_str().to_ascii_uppercase();
        if self.rule_type == RuleType::Final {
            write!(f, "{},{}", kind, action)
        } else {
            write!(f, "{},{},{}", kind, self.value, action)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_types() {
        for t in RuleType::ALL {
            assert_eq!(t.as_str().parse::<RuleType>().unwrap(), t);
        }
        assert_eq!("geoip".parse::<RuleType>().unwrap(), RuleType::GeoIp);
    }

    #[test]
    fn parse_is_exact() {
        assert!("DOMAIN".parse::<RuleType>().is_err());
        assert!("Reject".parse::<RuleAction>().is_err());
        assert_eq!(
            "block".parse::<RuleAction>(),
            Err(UnknownVariant("block".into()))
        );
        let err = "regex".parse::<RuleType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown variant 'regex'");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn display_as_config_line() {
        let rule = Rule::new(RuleType::DomainSuffix, RuleAction::Reject, "ads.com");
        assert_eq!(rule.to_string(), "DOMAIN-SUFFIX,ads.com,REJECT");

        let rule = Rule::new(RuleType::Final, RuleAction::Proxy, "");
        assert_eq!(rule.to_string(), "FINAL,PROXY");
    }

    #[test]
    fn serialization_format() {
        let rule = Rule::new(RuleType::IpCidr, RuleAction::Direct, "10.0.0.0/8");
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(
            json,
            r#"{"type":"ip-cidr","action":"direct","value":"10.0.0.0/8"}"#
        );
        let parsed: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rule);
    }
}
