//! Field mapping from untyped JSON into rules and rule sets.
//!
//! Mapping never fails loudly: a value that cannot become an entity maps to
//! `None` and the caller decides whether that is fatal (a single object) or
//! just skipped (an element of an array).
//!
//! # Wire fields
//!
//! Rule set: `id`, `name`, `created_at`, `updated_at`, `description`,
//! `rule_count`, `is_official`, `rules`.
//! Rule: `pattern`, `action`, `type`.

use crate::{Rule, RuleAction, RuleSet, RuleType, Timestamp};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Current wall-clock time in seconds since epoch.
pub fn now() -> Timestamp {
    Utc::now().timestamp()
}

/// Types that can be built from a JSON value.
pub trait FromJson: Sized {
    /// Map `value`, using `now` wherever the date transform falls back.
    fn from_json_at(value: &Value, now: Timestamp) -> Option<Self>;

    /// Map `value` against the wall clock.
    fn from_json(value: &Value) -> Option<Self> {
        Self::from_json_at(value, now())
    }
}

/// Map every element independently, keeping the successes in order.
///
/// The result is never longer than the input; elements that do not map are
/// dropped rather than aborting the whole array.
pub fn map_array<T: FromJson>(values: &[Value], now: Timestamp) -> Vec<T> {
    values
        .iter()
        .fold(Vec::with_capacity(values.len()), |mut mapped, value| {
            if let Some(entity) = T::from_json_at(value, now) {
                mapped.push(entity);
            }
            mapped
        })
}

/// Outcome of decoding a date field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedDate {
    /// The field held a valid ISO-8601 date.
    Parsed(Timestamp),
    /// The field was missing or unreadable; the current time was used.
    FallbackToNow(Timestamp),
}

impl DecodedDate {
    /// Seconds since epoch, whichever way they were obtained.
    pub fn seconds(self) -> Timestamp {
        match self {
            DecodedDate::Parsed(ts) | DecodedDate::FallbackToNow(ts) => ts,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DecodedDate::FallbackToNow(_))
    }
}

/// ISO-8601 string <-> epoch seconds.
pub struct DateTransform;

impl DateTransform {
    /// Decode a date field. Anything other than a parseable ISO-8601 string
    /// becomes [`DecodedDate::FallbackToNow`].
    pub fn decode(value: Option<&Value>, now: Timestamp) -> DecodedDate {
        match value.and_then(Value::as_str).and_then(Self::parse) {
            Some(ts) => DecodedDate::Parsed(ts),
            None => DecodedDate::FallbackToNow(now),
        }
    }

    /// Parse an ISO-8601 date. Offsets may be written `+08:00` or `+0800`;
    /// strings without an offset are read as UTC, and a bare date as midnight UTC.
    pub fn parse(s: &str) -> Option<Timestamp> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.timestamp());
        }
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(dt.timestamp());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc().timestamp());
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc().timestamp())
    }

    /// Encode epoch seconds as an ISO-8601 UTC string.
    pub fn encode(ts: Timestamp) -> Option<String> {
        DateTime::<Utc>::from_timestamp(ts, 0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn date_field(object: &Map<String, Value>, uuid: &str, key: &str, now: Timestamp) -> Timestamp {
    let decoded = DateTransform::decode(object.get(key), now);
    if decoded.is_fallback() {
        tracing::warn!(
            uuid = %uuid,
            field = key,
            "Date field missing or unparseable, using current time"
        );
    }
    decoded.seconds()
}

impl FromJson for Rule {
    fn from_json_at(value: &Value, _now: Timestamp) -> Option<Self> {
        let object = value.as_object()?;
        let pattern = object.get("pattern")?.as_str()?;
        let action: RuleAction = object.get("action")?.as_str()?.parse().ok()?;
        let rule_type: RuleType = object.get("type")?.as_str()?.parse().ok()?;
        Some(Rule::new(rule_type, action, pattern))
    }
}

impl FromJson for RuleSet {
    fn from_json_at(value: &Value, now: Timestamp) -> Option<Self> {
        let object = value.as_object()?;
        let rules = object.get("rules")?.as_array()?;
        let uuid = object.get("id")?.as_str()?;

        let mut rule_set = RuleSet::new(uuid);
        rule_set.name = string_field(object, "name").unwrap_or_default();
        rule_set.description = string_field(object, "description").unwrap_or_default();
        rule_set.create_at = date_field(object, uuid, "created_at", now);
        rule_set.remote_updated_at = date_field(object, uuid, "updated_at", now);
        if let Some(count) = object.get("rule_count").and_then(Value::as_i64) {
            rule_set.rule_count = count;
        }
        if let Some(official) = object.get("is_official").and_then(Value::as_bool) {
            rule_set.is_official = official;
        }

        let mapped = map_array::<Rule>(rules, now);
        if mapped.len() < rules.len() {
            tracing::debug!(
                uuid = %uuid,
                dropped = rules.len() - mapped.len(),
                "Dropped invalid rules"
            );
        }
        rule_set.set_rules(mapped);

        Some(rule_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: Timestamp = 1_700_000_000;

    fn ads_json() -> Value {
        json!({
            "id": "a1",
            "name": "Ads",
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2020-01-02T00:00:00Z",
            "description": "d",
            "rule_count": 3,
            "is_official": true,
            "rules": [{"pattern": "*.ads.com", "action": "reject", "type": "domain"}]
        })
    }

    #[test]
    fn map_rule() {
        let rule = Rule::from_json(&json!({
            "pattern": "*.ads.com",
            "action": "reject",
            "type": "domain"
        }))
        .unwrap();

        assert_eq!(rule.rule_type(), RuleType::Domain);
        assert_eq!(rule.action(), RuleAction::Reject);
        assert_eq!(rule.value(), "*.ads.com");
    }

    #[test]
    fn rule_requires_all_three_fields() {
        let missing_pattern = json!({"action": "reject", "type": "domain"});
        let bad_action = json!({"pattern": "x", "action": "block", "type": "domain"});
        let bad_type = json!({"pattern": "x", "action": "reject", "type": "regex"});
        let number_pattern = json!({"pattern": 42, "action": "reject", "type": "domain"});

        assert!(Rule::from_json(&missing_pattern).is_none());
        assert!(Rule::from_json(&bad_action).is_none());
        assert!(Rule::from_json(&bad_type).is_none());
        assert!(Rule::from_json(&number_pattern).is_none());
        assert!(Rule::from_json(&json!("domain")).is_none());
    }

    #[test]
    fn map_rule_set_fields() {
        let rule_set = RuleSet::from_json_at(&ads_json(), NOW).unwrap();

        assert_eq!(rule_set.uuid, "a1");
        assert_eq!(rule_set.name, "Ads");
        assert_eq!(rule_set.description, "d");
        assert_eq!(rule_set.rule_count, 3);
        assert!(rule_set.is_official);
        assert_eq!(rule_set.create_at, 1_577_836_800);
        assert_eq!(rule_set.remote_updated_at, 1_577_923_200);
        assert_eq!(
            rule_set.rules,
            vec![Rule::new(RuleType::Domain, RuleAction::Reject, "*.ads.com")]
        );
    }

    #[test]
    fn rule_set_requires_rules_array() {
        let mut value = ads_json();
        value.as_object_mut().unwrap().remove("rules");
        assert!(RuleSet::from_json_at(&value, NOW).is_none());

        value["rules"] = json!("not an array");
        assert!(RuleSet::from_json_at(&value, NOW).is_none());
    }

    #[test]
    fn rule_set_requires_id() {
        let mut value = ads_json();
        value["id"] = json!(17);
        assert!(RuleSet::from_json_at(&value, NOW).is_none());
    }

    #[test]
    fn invalid_rules_are_dropped() {
        let mut value = ads_json();
        value["rules"] = json!([
            {"pattern": "a.com", "action": "reject", "type": "domain"},
            {"action": "reject", "type": "domain"},
            {"pattern": "10.0.0.0/8", "action": "direct", "type": "ip-cidr"}
        ]);

        let rule_set = RuleSet::from_json_at(&value, NOW).unwrap();
        assert_eq!(rule_set.rules.len(), 2);
        assert_eq!(rule_set.rules[0].value(), "a.com");
        assert_eq!(rule_set.rules[1].value(), "10.0.0.0/8");
    }

    #[test]
    fn wrongly_typed_scalars_keep_defaults() {
        let value = json!({
            "id": "a1",
            "name": 5,
            "rule_count": "three",
            "is_official": "yes",
            "rules": []
        });
        let rule_set = RuleSet::from_json_at(&value, NOW).unwrap();

        assert_eq!(rule_set.name, "");
        assert_eq!(rule_set.rule_count, 0);
        assert!(!rule_set.is_official);
    }

    #[test]
    fn date_fallback_is_current_time() {
        assert_eq!(
            DateTransform::decode(Some(&json!("not a date")), NOW),
            DecodedDate::FallbackToNow(NOW)
        );
        assert_eq!(
            DateTransform::decode(None, NOW),
            DecodedDate::FallbackToNow(NOW)
        );
        assert_eq!(
            DateTransform::decode(Some(&json!(12345)), NOW),
            DecodedDate::FallbackToNow(NOW)
        );

        let mut value = ads_json();
        value["updated_at"] = json!("yesterday");
        let rule_set = RuleSet::from_json_at(&value, NOW).unwrap();
        assert_eq!(rule_set.remote_updated_at, NOW);
    }

    #[test]
    fn date_parse_variants() {
        assert_eq!(
            DateTransform::parse("2020-01-01T00:00:00Z"),
            Some(1_577_836_800)
        );
        assert_eq!(
            DateTransform::parse("2020-01-01T08:00:00+08:00"),
            Some(1_577_836_800)
        );
        assert_eq!(
            DateTransform::parse("2020-01-01T00:00:00.250"),
            Some(1_577_836_800)
        );
        assert_eq!(
            DateTransform::parse("2020-01-02T00:00:00+0000"),
            Some(1_577_923_200)
        );
        assert_eq!(
            DateTransform::parse("2020-01-02T08:00:00.5+0800"),
            Some(1_577_923_200)
        );
        assert_eq!(DateTransform::parse("2020-01-02"), Some(1_577_923_200));
        assert_eq!(DateTransform::parse("2020-01-02T00:00"), None);
        assert_eq!(DateTransform::parse("02/01/2020"), None);
    }

    #[test]
    fn date_encode_is_inverse() {
        assert_eq!(
            DateTransform::encode(1_577_836_800).as_deref(),
            Some("2020-01-01T00:00:00Z")
        );
        let encoded = DateTransform::encode(NOW).unwrap();
        assert_eq!(DateTransform::parse(&encoded), Some(NOW));
    }

    #[test]
    fn map_array_drops_failures_in_order() {
        let values = vec![
            json!({"pattern": "a", "action": "proxy", "type": "domain"}),
            json!(null),
            json!({"pattern": "b", "action": "proxy", "type": "domain"}),
        ];
        let rules: Vec<Rule> = map_array(&values, NOW);
        let patterns: Vec<_> = rules.iter().map(Rule::value).collect();
        assert_eq!(patterns, vec!["a", "b"]);
    }
}
