//! Split rules: allocations of a transaction total to sub-merchants.
//!
//! Allocations come in as `(recipient, minor units)` pairs and leave as a
//! mapping from recipient to a two-decimal string, serialized on the wire as
//! a JSON object in the `split_rules` field. The allocations must add up to
//! the parent total exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::util::{MoneyAmount, MoneyAmountParseError};

/// One allocation as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRule {
    /// Sub-merchant identification.
    pub recipient: String,
    /// Allocated amount in minor units.
    pub amount: u64,
}

impl SplitRule {
    pub fn new(recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitRuleError {
    #[error("split rules require a positive total (got {total} minor units)")]
    NonPositiveTotal { total: u64 },
    #[error("split_rules[{index}]: recipient identification is required")]
    BlankRecipient { index: usize },
    #[error("split_rules[{recipient:?}]: amount must be > 0")]
    NonPositiveAmount { recipient: String },
    #[error("split_rules[{recipient:?}]: {source}")]
    InvalidAmount {
        recipient: String,
        #[source]
        source: MoneyAmountParseError,
    },
    #[error("split_rules: duplicate recipient {recipient:?}")]
    DuplicateRecipient { recipient: String },
    #[error("split rules total exceeds amount ({sum} > {total} minor units)")]
    ExceedsTotal { sum: u64, total: u64 },
    #[error("split rules total must equal amount ({sum} != {total} minor units)")]
    SumMismatch { sum: u64, total: u64 },
}

/// Normalized split rules: recipient to two-decimal amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitRules(BTreeMap<String, String>);

/// Running sum that refuses to pass the parent total.
struct Tally {
    sum: u64,
    total: u64,
}

impl Tally {
    fn new(total: u64) -> Result<Self, SplitRuleError> {
        if total == 0 {
            return Err(SplitRuleError::NonPositiveTotal { total });
        }
        Ok(Tally { sum: 0, total })
    }

    fn add(&mut self, amount: u64) -> Result<(), SplitRuleError> {
        let sum = self.sum.saturating_add(amount);
        if sum > self.total {
            return Err(SplitRuleError::ExceedsTotal {
                sum,
                total: self.total,
            });
        }
        self.sum = sum;
        Ok(())
    }

    fn finish(self) -> Result<(), SplitRuleError> {
        if self.sum != self.total {
            return Err(SplitRuleError::SumMismatch {
                sum: self.sum,
                total: self.total,
            });
        }
        Ok(())
    }
}

impl SplitRules {
    /// Validates caller allocations against `total` minor units and
    /// normalizes them.
    ///
    /// Recipients are trimmed. An empty rule list yields empty rules
    /// regardless of the total.
    pub fn normalize(rules: &[SplitRule], total: u64) -> Result<Self, SplitRuleError> {
        if rules.is_empty() {
            return Ok(Self::default());
        }
        let mut tally = Tally::new(total)?;
        let mut normalized = BTreeMap::new();
        for (index, rule) in rules.iter().enumerate() {
            let recipient = rule.recipient.trim();
            if recipient.is_empty() {
                return Err(SplitRuleError::BlankRecipient { index });
            }
            if rule.amount == 0 {
                return Err(SplitRuleError::NonPositiveAmount {
                    recipient: recipient.to_string(),
                });
            }
            tally.add(rule.amount)?;
            match normalized.entry(recipient.to_string()) {
                Entry::Occupied(_) => {
                    return Err(SplitRuleError::DuplicateRecipient {
                        recipient: recipient.to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(MoneyAmount::from_minor_units(rule.amount).to_string());
                }
            }
        }
        tally.finish()?;
        Ok(SplitRules(normalized))
    }

    /// Re-checks wire-form rules against `total` minor units.
    ///
    /// Validating rules produced by [`SplitRules::normalize`] returns an
    /// identical mapping.
    pub fn validate(&self, total: u64) -> Result<Self, SplitRuleError> {
        if self.0.is_empty() {
            return Ok(Self::default());
        }
        let mut tally = Tally::new(total)?;
        let mut normalized = BTreeMap::new();
        for (index, (recipient, amount)) in self.0.iter().enumerate() {
            let trimmed = recipient.trim();
            if trimmed.is_empty() {
                return Err(SplitRuleError::BlankRecipient { index });
            }
            let parsed =
                MoneyAmount::parse(amount).map_err(|source| SplitRuleError::InvalidAmount {
                    recipient: trimmed.to_string(),
                    source,
                })?;
            if !parsed.is_positive() {
                return Err(SplitRuleError::NonPositiveAmount {
                    recipient: trimmed.to_string(),
                });
            }
            tally.add(parsed.minor_units())?;
            if normalized
                .insert(trimmed.to_string(), parsed.to_string())
                .is_some()
            {
                return Err(SplitRuleError::DuplicateRecipient {
                    recipient: trimmed.to_string(),
                });
            }
        }
        tally.finish()?;
        Ok(SplitRules(normalized))
    }

    /// Wraps an already wire-formatted mapping without checking it.
    pub fn from_wire(rules: BTreeMap<String, String>) -> Self {
        SplitRules(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, recipient: &str) -> Option<&str> {
        self.0.get(recipient).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Compact JSON object sent as the `split_rules` form value.
    pub fn to_wire_json(&self) -> String {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
        .to_string()
    }
}
