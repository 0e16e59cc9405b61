//! Core types for the wallet: identifiers, accounts and records.

use crate::color::PackedColor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable identifier of an authenticated user.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document key assigned by the store. Empty until first persisted.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    /// True for entities that have not been persisted yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }

    /// Convert to a UTC date-time for calendar arithmetic.
    pub fn to_datetime(self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_micros(self.0)
    }

    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Timestamp(dt.timestamp_micros())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Kind of financial account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Debit,
    Credit,
    Cash,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [AccountType::Debit, AccountType::Credit, AccountType::Cash];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Debit => "Debit",
            AccountType::Credit => "Credit",
            AccountType::Cash => "Cash",
        }
    }

    /// Credit balances are stored negated.
    pub fn is_liability(&self) -> bool {
        matches!(self, AccountType::Credit)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A financial account owned by one user.
///
/// Documents written by older builds may lack `accountType`, `currency` or
/// `last4Digits`; those decode to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    /// Assigned by the store on creation.
    pub id: DocumentId,
    pub name: String,
    pub account_type: AccountType,
    pub last4_digits: String,
    /// Signed decimal string.
    pub amount: String,
    pub currency: String,
    pub color: PackedColor,
    pub user_id: UserId,
}

/// A transaction recorded against an account.
///
/// Account display fields are copied in when the record is created and are
/// not refreshed when the account changes later.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Record {
    pub id: DocumentId,
    pub account_id: DocumentId,
    pub account_name: String,
    pub category: String,
    /// Unsigned decimal string.
    pub amount: String,
    pub currency: String,
    pub color: PackedColor,
    /// Filled in by the store on insert when absent.
    pub timestamp: Option<Timestamp>,
    pub user_id: UserId,
}

/// Profile of a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub user_id: UserId,
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
}
