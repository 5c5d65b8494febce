//! Core pawn ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ============================================================================
// Ticket Number
// ============================================================================

/// Error parsing a structured ticket number.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketNoParseError {
    #[error("ticket number must have three '/'-separated parts, got {0:?}")]
    WrongPartCount(String),
    #[error("ticket number part must not be empty: {0:?}")]
    EmptyPart(String),
}

/// A structured pawn ticket number: series / month-year / sequence.
///
/// Rendered and parsed as `"B/0725/1234"`. Serialized as the rendered
/// string so it can be used directly as a JSON key or API path value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketNo {
    /// Book series letter(s), e.g. "B".
    pub series: String,
    /// Issue month and year, e.g. "0725" for July 2025.
    pub month_year: String,
    /// Sequence number within the book, e.g. "1234".
    pub sequence: String,
}

impl TicketNo {
    /// Create a ticket number from its three parts.
    pub fn new(
        series: impl Into<String>,
        month_year: impl Into<String>,
        sequence: impl Into<String>,
    ) -> Self {
        Self {
            series: series.into(),
            month_year: month_year.into(),
            sequence: sequence.into(),
        }
    }
}

impl fmt::Display for TicketNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.series, self.month_year, self.sequence)
    }
}

impl FromStr for TicketNo {
    type Err = TicketNoParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 {
            return Err(TicketNoParseError::WrongPartCount(s.to_string()));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(TicketNoParseError::EmptyPart(s.to_string()));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for TicketNo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TicketNo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ============================================================================
// Ticket Status
// ============================================================================

/// Settlement status carried on each ticket snapshot.
///
/// In a combined settlement batch, `Unredeemed` tickets are renewed while
/// `RedemptionReady` and `Redeemed` tickets go into the redemption subset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Ticket is open; the pledge is still held.
    Unredeemed,
    /// Customer has asked to redeem; awaiting settlement.
    RedemptionReady,
    /// Ticket has been settled and the pledge returned.
    Redeemed,
    /// Pledged item reported lost.
    Lost,
}

impl TicketStatus {
    /// True when a combined settlement treats this ticket as a redemption.
    pub fn settles_as_redemption(&self) -> bool {
        matches!(self, TicketStatus::RedemptionReady | TicketStatus::Redeemed)
    }

    /// Returns the status as a string (for filtering and audit).
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Unredeemed => "unredeemed",
            TicketStatus::RedemptionReady => "redemption_ready",
            TicketStatus::Redeemed => "redeemed",
            TicketStatus::Lost => "lost",
        }
    }
}

// ============================================================================
// Ticket Snapshot
// ============================================================================

/// A denormalized snapshot of a pawn ticket at the moment it entered the
/// session.
///
/// The authoritative record lives server-side; this copy is what the
/// operator sees and what calculations are keyed against. Real-time pushes
/// mutate it through [`TicketPatch`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketRef {
    /// Structured ticket number; unique within a session.
    pub ticket_no: TicketNo,
    /// Customer display name.
    pub customer_name: String,
    /// Customer identity document number, if captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Short description of the pledged item.
    pub pledge_description: String,
    /// Outstanding principal.
    pub principal: Decimal,
    /// Interest accrued to date.
    pub interest_due: Decimal,
    /// Penalty accrued to date.
    #[serde(default)]
    pub penalty_due: Decimal,
    /// Date the pledge was taken.
    pub pledge_date: NaiveDate,
    /// Date the ticket expires.
    pub expiry_date: NaiveDate,
    /// Settlement status.
    pub status: TicketStatus,
    /// When this snapshot entered the session.
    pub added_at: DateTime<Utc>,
}

impl TicketRef {
    /// Amount collected when this ticket is renewed (interest plus penalty).
    pub fn renewal_amount(&self) -> Decimal {
        self.interest_due + self.penalty_due
    }

    /// Amount collected when this ticket is redeemed.
    pub fn redemption_amount(&self) -> Decimal {
        self.principal + self.interest_due + self.penalty_due
    }
}

/// A partial update merged into an existing ticket snapshot.
///
/// Used both by operator-driven edits and by real-time pushes from other
/// terminals; unset fields leave the snapshot untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TicketPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_due: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_due: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pledge_description: Option<String>,
}

impl TicketPatch {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.principal.is_none()
            && self.interest_due.is_none()
            && self.penalty_due.is_none()
            && self.expiry_date.is_none()
            && self.customer_name.is_none()
            && self.pledge_description.is_none()
    }

    /// Merge the set fields into a ticket snapshot.
    pub fn apply(&self, ticket: &mut TicketRef) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(principal) = self.principal {
            ticket.principal = principal;
        }
        if let Some(interest_due) = self.interest_due {
            ticket.interest_due = interest_due;
        }
        if let Some(penalty_due) = self.penalty_due {
            ticket.penalty_due = penalty_due;
        }
        if let Some(expiry_date) = self.expiry_date {
            ticket.expiry_date = expiry_date;
        }
        if let Some(ref customer_name) = self.customer_name {
            ticket.customer_name = customer_name.clone();
        }
        if let Some(ref pledge_description) = self.pledge_description {
            ticket.pledge_description = pledge_description.clone();
        }
    }

    /// Patch that only changes the status.
    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
