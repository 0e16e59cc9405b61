//! Fixed-rate currency conversion and per-currency totals.

use crate::error::{Result, WalletError};
use crate::types::Account;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported account currencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Currency {
    Egp,
    Dollar,
    Euro,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Egp, Currency::Dollar, Currency::Euro];

    /// Code as stored on accounts and records.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Egp => "EGP",
            Currency::Dollar => "Dollar",
            Currency::Euro => "Euro",
        }
    }

    /// Value of one unit in EGP.
    pub fn egp_rate(&self) -> Decimal {
        match self {
            Currency::Egp => Decimal::ONE,
            Currency::Dollar => Decimal::new(4765, 2),
            Currency::Euro => Decimal::new(5125, 2),
        }
    }

    /// Convert `amount` of `self` into `to`, rounded to 2 decimal places.
    pub fn convert(&self, amount: Decimal, to: Currency) -> Result<Decimal> {
        if *self == to {
            return Ok(amount);
        }
        let egp = amount
            .checked_mul(self.egp_rate())
            .ok_or_else(|| WalletError::InvalidAmount(amount.to_string()))?;
        let converted = egp
            .checked_div(to.egp_rate())
            .ok_or_else(|| WalletError::InvalidAmount(amount.to_string()))?;
        Ok(converted.round_dp(2))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EGP" => Ok(Currency::Egp),
            "Dollar" | "USD" => Ok(Currency::Dollar),
            "Euro" | "EUR" => Ok(Currency::Euro),
            other => Err(WalletError::Validation(format!("unknown currency {other:?}"))),
        }
    }
}

/// Parse a stored amount string such as `"100"` or `"-250"`.
pub fn parse_amount(amount: &str) -> Result<Decimal> {
    Ok(Decimal::from_str(amount.trim())?)
}

/// Sum of account balances per currency.
///
/// Accounts with an unknown currency, an unparseable amount, or an amount
/// that would overflow the running total are skipped with a warning.
pub fn totals_by_currency(accounts: &[Account]) -> BTreeMap<Currency, Decimal> {
    let mut totals = BTreeMap::new();
    for account in accounts {
        let parsed = Currency::from_str(&account.currency)
            .and_then(|currency| Ok((currency, parse_amount(&account.amount)?)));
        let (currency, amount) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(account = %account.id, error = %e, "skipping account in totals");
                continue;
            }
        };
        let total = totals.entry(currency).or_insert(Decimal::ZERO);
        match total.checked_add(amount) {
            Some(sum) => *total = sum,
            None => tracing::warn!(account = %account.id, %currency, "total overflowed, skipping account"),
        }
    }
    totals
}

/// Net worth of all accounts expressed in `target`.
pub fn net_worth(accounts: &[Account], target: Currency) -> Result<Decimal> {
    totals_by_currency(accounts)
        .into_iter()
        .try_fold(Decimal::ZERO, |sum, (currency, total)| {
            let converted = currency.convert(total, target)?;
            sum.checked_add(converted)
                .ok_or_else(|| WalletError::InvalidAmount(format!("net worth overflows at {currency}")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn account(amount: &str, currency: &str) -> Account {
        Account {
            amount: amount.into(),
            currency: currency.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_rates() {
        assert_eq!(Currency::Dollar.convert(dec("1"), Currency::Egp).unwrap(), dec("47.65"));
        assert_eq!(Currency::Euro.convert(dec("2"), Currency::Egp).unwrap(), dec("102.50"));
        assert_eq!(Currency::Egp.convert(dec("47.65"), Currency::Dollar).unwrap(), dec("1"));
        assert_eq!(Currency::Euro.convert(dec("1"), Currency::Dollar).unwrap(), dec("1.08"));
        assert_eq!(Currency::Euro.convert(dec("3.333"), Currency::Euro).unwrap(), dec("3.333"));
    }

    #[test]
    fn test_codes_round_trip() {
        for currency in Currency::ALL {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
        }
        assert!("GBP".parse::<Currency>().is_err());
    }

    #[test]
    fn test_totals_by_currency() {
        let accounts = vec![
            account("100", "EGP"),
            account("-250", "EGP"),
            account("10", "Dollar"),
            account("oops", "Euro"),
            account("5", "Yen"),
        ];
        let totals = totals_by_currency(&accounts);

        assert_eq!(totals.get(&Currency::Egp), Some(&dec("-150")));
        assert_eq!(totals.get(&Currency::Dollar), Some(&dec("10")));
        assert_eq!(totals.get(&Currency::Euro), None);

        assert_eq!(net_worth(&accounts, Currency::Egp).unwrap(), dec("326.50"));
    }

    #[test]
    fn test_totals_near_decimal_max() {
        let max = Decimal::MAX.to_string();
        let accounts = vec![account(&max, "EGP"), account(&max, "EGP"), account(&max, "Dollar")];

        let totals = totals_by_currency(&accounts);
        assert_eq!(totals.get(&Currency::Egp), Some(&Decimal::MAX));
        assert_eq!(totals.get(&Currency::Dollar), Some(&Decimal::MAX));

        // Converting the dollar total to EGP cannot be represented
        assert!(matches!(
            net_worth(&accounts, Currency::Egp),
            Err(WalletError::InvalidAmount(_))
        ));
    }
}
