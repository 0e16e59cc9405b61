//! Validation and construction of accounts and records from user input.

use crate::color::Color;
use crate::error::{Result, WalletError};
use crate::types::{Account, AccountType, DocumentId, Record};

/// Currency preselected on a new account.
pub const DEFAULT_CURRENCY: &str = "EGP";

/// Input for creating or editing an account.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountDraft {
    pub name: String,
    pub account_type: AccountType,
    pub last4_digits: String,
    /// Unsigned amount as typed.
    pub amount: String,
    pub currency: String,
    pub color: Color,
}

impl Default for AccountDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            account_type: AccountType::default(),
            last4_digits: String::new(),
            amount: String::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            color: Color::RED,
        }
    }
}

impl AccountDraft {
    /// Prefill a draft from an existing account.
    pub fn from_account(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            account_type: account.account_type,
            last4_digits: account.last4_digits.clone(),
            amount: account.amount.trim_start_matches('-').to_string(),
            currency: account.currency.clone(),
            color: account.color.decode().unwrap_or(Color::RED),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WalletError::Validation("account name must not be blank".into()));
        }
        if self.last4_digits.len() != 4 || !is_digits(&self.last4_digits) {
            return Err(WalletError::Validation(
                "last 4 digits must be exactly four digits".into(),
            ));
        }
        validate_amount(&self.amount)
    }

    /// Stored amount. Credit balances are negative.
    pub fn signed_amount(&self) -> String {
        if self.account_type.is_liability() {
            format!("-{}", self.amount)
        } else {
            self.amount.clone()
        }
    }

    /// Build a new account; id and owner are assigned on write.
    pub fn build(&self) -> Result<Account> {
        self.validate()?;
        Ok(self.apply(Account::default()))
    }

    /// Apply the draft to `existing`, keeping its id and owner.
    pub fn build_update(&self, existing: &Account) -> Result<Account> {
        self.validate()?;
        Ok(self.apply(existing.clone()))
    }

    fn apply(&self, mut account: Account) -> Account {
        account.name = self.name.clone();
        account.account_type = self.account_type;
        account.last4_digits = self.last4_digits.clone();
        account.amount = self.signed_amount();
        account.currency = self.currency.clone();
        account.color = self.color.encode();
        account
    }
}

/// Input for creating or editing a record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordDraft {
    pub account: Option<Account>,
    pub category: String,
    pub amount: String,
}

impl RecordDraft {
    pub fn new(account: Option<Account>) -> Self {
        Self {
            account,
            ..Default::default()
        }
    }

    /// Prefill a draft from an existing record, selecting its account if it
    /// still exists.
    pub fn from_record(record: &Record, accounts: &[Account]) -> Self {
        Self {
            account: accounts.iter().find(|a| a.id == record.account_id).cloned(),
            category: record.category.clone(),
            amount: record.amount.clone(),
        }
    }

    pub fn validate(&self) -> Result<&Account> {
        let account = self
            .account
            .as_ref()
            .ok_or_else(|| WalletError::Validation("an account must be selected".into()))?;
        if account.id.is_empty() {
            return Err(WalletError::InvalidDocumentId(account.id.clone()));
        }
        if self.category.trim().is_empty() {
            return Err(WalletError::Validation("category must not be blank".into()));
        }
        validate_amount(&self.amount)?;
        Ok(account)
    }

    /// Build a new record. Account details are copied as they are now.
    pub fn build(&self) -> Result<Record> {
        self.validate()?;
        Ok(self.apply(Record::default()))
    }

    /// Apply the draft to `existing`, keeping its id, owner and timestamp.
    pub fn build_update(&self, existing: &Record) -> Result<Record> {
        self.validate()?;
        Ok(self.apply(existing.clone()))
    }

    fn apply(&self, mut record: Record) -> Record {
        if let Some(account) = &self.account {
            record.account_id = account.id.clone();
            record.account_name = account.name.clone();
            record.currency = account.currency.clone();
            record.color = account.color;
        }
        record.category = self.category.clone();
        record.amount = self.amount.clone();
        record
    }
}

/// Records that reference `account`.
pub fn records_for<'a>(records: &'a [Record], account: &'a DocumentId) -> impl Iterator<Item = &'a Record> {
    records.iter().filter(move |r| &r.account_id == account)
}

fn validate_amount(amount: &str) -> Result<()> {
    if amount.is_empty() {
        return Err(WalletError::Validation("amount must not be empty".into()));
    }
    if !is_digits(amount) {
        return Err(WalletError::InvalidAmount(amount.to_string()));
    }
    // Must fit the decimal type used for totals and conversion.
    crate::currency::parse_amount(amount)?;
    Ok(())
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn cash() -> AccountDraft {
        AccountDraft {
            name: "Cash".into(),
            account_type: AccountType::Cash,
            last4_digits: "1234".into(),
            amount: "100".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_account_rules() {
        assert!(cash().build().is_ok());

        let blank = AccountDraft {
            name: "  ".into(),
            ..cash()
        };
        assert!(matches!(blank.validate(), Err(WalletError::Validation(_))));

        for digits in ["123", "12345", "12a4", ""] {
            let draft = AccountDraft {
                last4_digits: digits.into(),
                ..cash()
            };
            assert!(draft.validate().is_err(), "{digits:?} accepted");
        }

        let amount = AccountDraft {
            amount: "10.5".into(),
            ..cash()
        };
        assert!(matches!(amount.validate(), Err(WalletError::InvalidAmount(_))));

        let huge = AccountDraft {
            amount: "9".repeat(40),
            ..cash()
        };
        assert!(matches!(huge.validate(), Err(WalletError::InvalidAmount(_))));
        let widest = AccountDraft {
            amount: rust_decimal::Decimal::MAX.to_string(),
            ..cash()
        };
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn test_credit_amount_is_negative() {
        let draft = AccountDraft {
            account_type: AccountType::Credit,
            amount: "250".into(),
            ..cash()
        };
        let account = draft.build().unwrap();
        assert_eq!(account.amount, "-250");

        // Re-editing does not double the sign
        let again = AccountDraft::from_account(&account).build().unwrap();
        assert_eq!(again.amount, "-250");
    }

    #[test]
    fn test_update_keeps_identity() {
        let existing = Account {
            id: DocumentId::new("acc-1"),
            user_id: UserId::new("u-1"),
            ..cash().build().unwrap()
        };
        let edited = AccountDraft {
            name: "Wallet".into(),
            color: Color::BLACK,
            ..AccountDraft::from_account(&existing)
        }
        .build_update(&existing)
        .unwrap();

        assert_eq!(edited.id, existing.id);
        assert_eq!(edited.user_id, existing.user_id);
        assert_eq!(edited.name, "Wallet");
        assert_eq!(edited.color, Color::BLACK.encode());
    }

    #[test]
    fn test_record_copies_account() {
        let account = Account {
            id: DocumentId::new("acc-1"),
            ..cash().build().unwrap()
        };
        let record = RecordDraft {
            account: Some(account.clone()),
            category: "Food".into(),
            amount: "20".into(),
        }
        .build()
        .unwrap();

        assert_eq!(record.account_id, account.id);
        assert_eq!(record.account_name, "Cash");
        assert_eq!(record.currency, DEFAULT_CURRENCY);
        assert_eq!(record.color, Color::RED.encode());
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn test_record_rules() {
        assert!(matches!(
            RecordDraft::new(None).validate(),
            Err(WalletError::Validation(_))
        ));

        let unsaved = RecordDraft {
            account: Some(cash().build().unwrap()),
            category: "Food".into(),
            amount: "20".into(),
        };
        assert!(matches!(unsaved.validate(), Err(WalletError::InvalidDocumentId(_))));

        let account = Account {
            id: DocumentId::new("acc-1"),
            ..cash().build().unwrap()
        };
        let blank = RecordDraft {
            account: Some(account),
            category: " ".into(),
            amount: "20".into(),
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_record_keeps_color_after_recolor() {
        let mut account = Account {
            id: DocumentId::new("acc-1"),
            ..cash().build().unwrap()
        };
        let record = RecordDraft {
            account: Some(account.clone()),
            category: "Food".into(),
            amount: "20".into(),
        }
        .build()
        .unwrap();

        account.color = Color::BLACK.encode();
        assert_eq!(record.color, Color::RED.encode());

        let reopened = RecordDraft::from_record(&record, &[account.clone()]);
        assert_eq!(reopened.account, Some(account));
        assert_eq!(records_for(&[record], &DocumentId::new("acc-1")).count(), 1);
    }
}
