//! Internal helpers for command validation.
//!
//! These utilities are **not** part of the public API. They centralize the
//! checks the gateway runs before anything reaches the store.

use crate::{
    AddTransactionCmd, MoneyCents, NewTransaction, ResultValidation, UserId, ValidationError,
};

/// Trim `value`; `None` when nothing is left.
pub(crate) fn normalize_required_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parse a user-typed amount; must be a finite number of at least 0.01.
pub(crate) fn parse_positive_amount(raw: &str) -> ResultValidation<MoneyCents> {
    let amount: MoneyCents = raw.parse()?;
    if !amount.is_positive() {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(amount)
}

/// Turn a raw command into the record the store will receive.
pub(crate) fn validate_add(cmd: AddTransactionCmd) -> ResultValidation<NewTransaction> {
    let owner_id = cmd
        .owner_id
        .filter(|owner| !owner.as_str().trim().is_empty())
        .ok_or(ValidationError::MissingOwner)?;
    let title = normalize_required_text(&cmd.title).ok_or(ValidationError::EmptyTitle)?;
    let amount = parse_positive_amount(&cmd.amount)?;
    let category = normalize_required_text(&cmd.category).ok_or(ValidationError::EmptyCategory)?;

    Ok(NewTransaction {
        owner_id: UserId::new(owner_id.as_str().trim()),
        kind: cmd.kind,
        title,
        amount,
        category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionKind;

    fn cmd() -> AddTransactionCmd {
        AddTransactionCmd::new("alice", TransactionKind::Expense, "Coffee", "4.50", "Food")
    }

    #[test]
    fn valid_command_is_trimmed() {
        let record = validate_add(cmd().title("  Coffee ").category(" Food")).unwrap();
        assert_eq!(record.title, "Coffee");
        assert_eq!(record.category, "Food");
        assert_eq!(record.amount, MoneyCents::new(450));
    }

    #[test]
    fn amount_must_be_positive_and_numeric() {
        assert_eq!(
            validate_add(cmd().amount("0")),
            Err(ValidationError::NonPositiveAmount)
        );
        assert_eq!(
            validate_add(cmd().amount("-5")),
            Err(ValidationError::NonPositiveAmount)
        );
        assert!(matches!(
            validate_add(cmd().amount("abc")),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert_eq!(
            validate_add(cmd().amount("0.01")).map(|r| r.amount),
            Ok(MoneyCents::MIN_POSITIVE)
        );
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert_eq!(validate_add(cmd().title("   ")), Err(ValidationError::EmptyTitle));
        assert_eq!(validate_add(cmd().category("")), Err(ValidationError::EmptyCategory));
        let anonymous =
            AddTransactionCmd::anonymous(TransactionKind::Expense, "Coffee", "4.50", "Food");
        assert_eq!(validate_add(anonymous), Err(ValidationError::MissingOwner));
    }

    #[test]
    fn any_non_empty_category_is_accepted() {
        let record = validate_add(cmd().category("Groceries")).unwrap();
        assert_eq!(record.category, "Groceries");
    }
}
