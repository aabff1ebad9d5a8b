//! Recurring obligation templates and their frequency tags.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OutlayError, Result};

/// Occurrence interval of a recurring template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = OutlayError;

    /// Case-insensitive; anything other than weekly/monthly is rejected here so it
    /// never reaches the materializer.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            _ => Err(OutlayError::InvalidFrequency(s.to_string())),
        }
    }
}

/// Durable definition of a recurring obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: Uuid,
    pub owner_id: i64,
    pub title: String,
    /// Always positive.
    pub amount: f64,
    pub category: String,
    pub frequency: Frequency,
    /// Earliest occurrence not yet converted into an expense.
    pub next_due_date: NaiveDate,
    pub active: bool,
}

impl RecurringTemplate {
    /// New active template owned by `owner_id`.
    pub fn new(owner_id: i64, fields: TemplateFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: fields.title,
            amount: fields.amount,
            category: fields.category,
            frequency: fields.frequency,
            next_due_date: fields.next_due_date,
            active: true,
        }
    }

    /// Overwrite the user-editable fields. `active` is left alone.
    pub fn apply(&mut self, fields: TemplateFields) {
        self.title = fields.title;
        self.amount = fields.amount;
        self.category = fields.category;
        self.frequency = fields.frequency;
        self.next_due_date = fields.next_due_date;
    }

    pub fn is_due(&self, cutoff: NaiveDate) -> bool {
        self.active && self.next_due_date <= cutoff
    }

    /// `Unauthorized` unless the template belongs to `owner_id`.
    pub fn ensure_owner(&self, owner_id: i64) -> Result<()> {
        if self.owner_id == owner_id {
            Ok(())
        } else {
            Err(OutlayError::Unauthorized)
        }
    }
}

/// Raw create/edit request as it arrives from a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub frequency: String,
    pub next_due_date: NaiveDate,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFields {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
}

impl TemplateDraft {
    pub fn validate(self) -> Result<TemplateFields> {
        let frequency: Frequency = self.frequency.parse()?;
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(OutlayError::InvalidTemplate("title is empty".into()));
        }
        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(OutlayError::InvalidTemplate("category is empty".into()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(OutlayError::InvalidTemplate(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(TemplateFields {
            title,
            amount: self.amount,
            category,
            frequency,
            next_due_date: self.next_due_date,
        })
    }
}
