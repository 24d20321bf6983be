//! Positions of the values the verifier checks inside the public-input list.
//!
//! The layout is a per-campaign contract between the circuit and this
//! service, so it lives in deployment configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::{current_date_from_parts, parse_yymmdd};
use crate::Rejection;

/// Where the proof's "today" lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum CurrentDateLayout {
    /// One `YYMMDD` input.
    Packed { index: usize },
    /// Three decimal inputs: year offset from 2000, month, day.
    Split { year: usize, month: usize, day: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputSchema {
    /// Exact number of public inputs the circuit emits.
    #[serde(default = "default_length")]
    pub length: usize,
    #[serde(default)]
    pub nullifier: usize,
    #[serde(default = "default_birth_date")]
    pub birth_date: usize,
    #[serde(default = "default_current_date")]
    pub current_date: CurrentDateLayout,
    /// Document expiry, `YYMMDD`.
    #[serde(default = "default_expiration_date")]
    pub expiration_date: usize,
    #[serde(default = "default_citizenship")]
    pub citizenship: usize,
    #[serde(default = "default_event_id")]
    pub event_id: usize,
    #[serde(default = "default_address_binding")]
    pub address_binding: usize,
    #[serde(default = "default_selector")]
    pub selector: usize,
}

fn default_length() -> usize {
    14
}
fn default_birth_date() -> usize {
    1
}
fn default_current_date() -> CurrentDateLayout {
    CurrentDateLayout::Packed { index: 2 }
}
fn default_expiration_date() -> usize {
    7
}
fn default_citizenship() -> usize {
    6
}
fn default_event_id() -> usize {
    9
}
fn default_address_binding() -> usize {
    10
}
fn default_selector() -> usize {
    12
}

impl Default for PublicInputSchema {
    fn default() -> Self {
        Self {
            length: default_length(),
            nullifier: 0,
            birth_date: default_birth_date(),
            current_date: default_current_date(),
            expiration_date: default_expiration_date(),
            citizenship: default_citizenship(),
            event_id: default_event_id(),
            address_binding: default_address_binding(),
            selector: default_selector(),
        }
    }
}

/// The named fields of one public-input list, borrowed from the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputs<'a> {
    pub nullifier: &'a str,
    pub birth_date: &'a str,
    pub current_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub citizenship: &'a str,
    pub event_id: &'a str,
    pub address_binding: &'a str,
    pub selector: &'a str,
}

impl PublicInputSchema {
    fn indices(&self) -> Vec<usize> {
        let mut all = vec![
            self.nullifier,
            self.birth_date,
            self.expiration_date,
            self.citizenship,
            self.event_id,
            self.address_binding,
            self.selector,
        ];
        match self.current_date {
            CurrentDateLayout::Packed { index } => all.push(index),
            CurrentDateLayout::Split { year, month, day } => all.extend([year, month, day]),
        }
        all
    }

    /// Reject schemas that index past `length` or read two fields from one
    /// position. Run once at startup.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = Vec::new();
        for i in self.indices() {
            if i >= self.length {
                return Err(format!(
                    "public input index {i} is out of range for length {}",
                    self.length
                ));
            }
            if seen.contains(&i) {
                return Err(format!("public input index {i} is used twice"));
            }
            seen.push(i);
        }
        Ok(())
    }

    /// Check the list length, then pull out every field.
    pub fn extract<'a>(&self, signals: &'a [String]) -> Result<PublicInputs<'a>, Rejection> {
        if signals.len() != self.length {
            return Err(Rejection::MalformedInputs {
                expected: self.length,
                got: signals.len(),
            });
        }
        let field = move |index: usize, name: &'static str| -> Result<&'a str, Rejection> {
            let value = signals
                .get(index)
                .map(|s| s.trim())
                .ok_or(Rejection::MalformedInputs {
                    expected: index + 1,
                    got: signals.len(),
                })?;
            if value.is_empty() {
                return Err(Rejection::InvalidInput {
                    name,
                    reason: "empty".into(),
                });
            }
            Ok(value)
        };

        let current_date = match self.current_date {
            CurrentDateLayout::Packed { index } => {
                let (yy, mm, dd) =
                    parse_yymmdd(field(index, "current_date")?).ok_or(Rejection::InvalidInput {
                        name: "current_date",
                        reason: "expected YYMMDD".into(),
                    })?;
                current_date_from_parts(yy, mm, dd)
            }
            CurrentDateLayout::Split { year, month, day } => {
                let number = |index, name| -> Result<u32, Rejection> {
                    field(index, name)?.parse().map_err(|_| Rejection::InvalidInput {
                        name,
                        reason: "expected a decimal number".into(),
                    })
                };
                let yy = number(year, "current_year")?;
                let mm = number(month, "current_month")?;
                let dd = number(day, "current_day")?;
                if yy > 99 {
                    None
                } else {
                    current_date_from_parts(yy, mm, dd)
                }
            }
        }
        .ok_or(Rejection::InvalidInput {
            name: "current_date",
            reason: "not a calendar date".into(),
        })?;

        let expiration_date = parse_yymmdd(field(self.expiration_date, "expiration_date")?)
            .and_then(|(yy, mm, dd)| current_date_from_parts(yy, mm, dd))
            .ok_or(Rejection::InvalidInput {
                name: "expiration_date",
                reason: "expected a YYMMDD calendar date".into(),
            })?;

        Ok(PublicInputs {
            nullifier: field(self.nullifier, "nullifier")?,
            birth_date: field(self.birth_date, "birth_date")?,
            current_date,
            expiration_date,
            citizenship: field(self.citizenship, "citizenship")?,
            event_id: field(self.event_id, "event_id")?,
            address_binding: field(self.address_binding, "address_binding")?,
            selector: field(self.selector, "selector")?,
        })
    }
}
