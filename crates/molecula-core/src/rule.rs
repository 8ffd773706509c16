//! Rules carried by `R` atoms.
//!
//! A rule pairs conditions on incoming metadata with callbacks the ledger
//! runs when every condition holds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyError;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "===")]
    StrictEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!==")]
    StrictNotEqual,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub value: Value,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Callback {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

impl Callback {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            meta_type: None,
            meta_id: None,
            meta: None,
            address: None,
            token: None,
            amount: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub condition: Vec<Condition>,
    pub callback: Vec<Callback>,
}

impl Rule {
    /// Build a rule, checking every part is well formed.
    pub fn new(condition: Vec<Condition>, callback: Vec<Callback>) -> Result<Self, PolicyError> {
        let rule = Self {
            key: None,
            condition,
            callback,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Parse one rule object.
    pub fn from_value(value: &Value) -> Result<Self, PolicyError> {
        let rule: Rule = serde_json::from_value(value.clone())
            .map_err(|e| PolicyError::RuleInvalid(e.to_string()))?;
        rule.validate()?;
        Ok(rule)
    }

    fn validate(&self) -> Result<(), PolicyError> {
        for condition in &self.condition {
            if condition.key.is_empty() {
                return Err(PolicyError::RuleInvalid("condition without a key".into()));
            }
            if condition.value.is_null() {
                return Err(PolicyError::RuleInvalid(format!(
                    "condition on {} has no value",
                    condition.key
                )));
            }
        }
        if self.callback.iter().any(|c| c.action.is_empty()) {
            return Err(PolicyError::RuleInvalid("callback without an action".into()));
        }
        Ok(())
    }
}

/// Parse the JSON text of a `rule` meta entry: a non-empty array of rules.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, PolicyError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| PolicyError::RuleInvalid(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(PolicyError::RuleInvalid("rules must be an array".into()));
    };
    if items.is_empty() {
        return Err(PolicyError::RuleInvalid("no rules".into()));
    }
    items.iter().map(Rule::from_value).collect()
}
