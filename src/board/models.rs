use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque lead identity. Wraps the CRM's integer primary key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LeadId(pub i64);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six funnel stages, declared in funnel order.
///
/// `Ord` follows declaration order, which is what list sorting and
/// forward/backward navigation rely on. `Converted` and `Lost` are terminal:
/// no urgency applies to leads parked there.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Stage {
    New,
    Contacted,
    Interested,
    Quoted,
    Converted,
    Lost,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::New,
        Stage::Contacted,
        Stage::Interested,
        Stage::Quoted,
        Stage::Converted,
        Stage::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Interested => "Interested",
            Self::Quoted => "Quoted",
            Self::Converted => "Converted",
            Self::Lost => "Lost",
        }
    }

    /// Probability weight applied to a quoted amount when projecting revenue.
    pub fn weight(&self) -> f64 {
        match self {
            Self::New => 0.1,
            Self::Contacted => 0.2,
            Self::Interested => 0.4,
            Self::Quoted => 0.7,
            Self::Converted => 1.0,
            Self::Lost => 0.0,
        }
    }

    /// Display color for view layers, as a hex string.
    pub fn color(&self) -> &'static str {
        match self {
            Self::New => "#3498db",
            Self::Contacted => "#f39c12",
            Self::Interested => "#e67e22",
            Self::Quoted => "#9b59b6",
            Self::Converted => "#27ae60",
            Self::Lost => "#e74c3c",
        }
    }

    /// Terminal stages sit at the end of the funnel; leads there are no
    /// longer worked, so follow-up urgency does not apply.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Lost)
    }

    /// One position forward (positive direction) or backward (negative) in
    /// funnel order, clamped at both ends. Zero stays put.
    pub fn adjacent(self, direction: i32) -> Stage {
        let last = Self::ALL.len() as i32 - 1;
        let idx = (self as i32 + direction.signum()).clamp(0, last);
        Self::ALL[idx as usize]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "interested" => Ok(Self::Interested),
            "quoted" => Ok(Self::Quoted),
            "converted" => Ok(Self::Converted),
            "lost" => Ok(Self::Lost),
            _ => Err(format!("Invalid stage: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Follow-up urgency for a non-terminal lead, derived from days since the
/// last recorded contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Overdue,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Overdue => "overdue",
        }
    }
}

/// A single lead card on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub course: Option<String>,
    pub lead_source: Option<String>,
    pub quoted_amount: Option<f64>,
    pub stage: Stage,
    pub last_contact_date: Option<NaiveDate>,
    pub next_followup_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    pub fn new(id: LeadId, name: impl Into<String>, phone: impl Into<String>, stage: Stage) -> Self {
        Self {
            id,
            name: name.into(),
            phone: phone.into(),
            whatsapp: None,
            email: None,
            course: None,
            lead_source: None,
            quoted_amount: None,
            stage,
            last_contact_date: None,
            next_followup_date: None,
            priority: Priority::default(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    pub fn with_quoted_amount(mut self, amount: f64) -> Self {
        self.quoted_amount = Some(amount);
        self
    }

    pub fn with_last_contact(mut self, date: NaiveDate) -> Self {
        self.last_contact_date = Some(date);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Days elapsed since the last recorded contact, or `None` when no
    /// contact was ever recorded.
    pub fn days_since_contact(&self, today: NaiveDate) -> Option<i64> {
        self.last_contact_date.map(|date| (today - date).num_days())
    }

    /// Follow-up urgency against an injected `today`, so callers (and tests)
    /// control the clock. Terminal stages have no urgency. A lead with no
    /// recorded contact counts as infinitely old.
    pub fn urgency(&self, today: NaiveDate) -> Option<Urgency> {
        if self.stage.is_terminal() {
            return None;
        }
        let days = self.days_since_contact(today).unwrap_or(i64::MAX);
        Some(if days > 14 {
            Urgency::Overdue
        } else if days > 7 {
            Urgency::Warning
        } else {
            Urgency::Normal
        })
    }

    /// Merges a partial update. `Some` overwrites the field, `None` leaves it
    /// untouched; there is no way to clear a field through a patch.
    pub fn apply_patch(&mut self, patch: &LeadPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(whatsapp) = &patch.whatsapp {
            self.whatsapp = Some(whatsapp.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(course) = &patch.course {
            self.course = Some(course.clone());
        }
        if let Some(lead_source) = &patch.lead_source {
            self.lead_source = Some(lead_source.clone());
        }
        if let Some(amount) = patch.quoted_amount {
            self.quoted_amount = Some(amount);
        }
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
        if let Some(date) = patch.last_contact_date {
            self.last_contact_date = Some(date);
        }
        if let Some(date) = patch.next_followup_date {
            self.next_followup_date = Some(date);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
    }
}

/// Partial update for a lead. Every field optional; absent fields are left
/// as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub course: Option<String>,
    pub lead_source: Option<String>,
    pub quoted_amount: Option<f64>,
    pub stage: Option<Stage>,
    pub last_contact_date: Option<NaiveDate>,
    pub next_followup_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
}
