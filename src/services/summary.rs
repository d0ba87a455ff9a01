use bigdecimal::{BigDecimal, Zero};

use crate::models::{Category, CategoryTotal, TransactionSummary};
use crate::money::round_currency;

/// Folds grouped category totals into income, expense and balance.
///
/// Sums stay exact until the very end; only the three reported figures are
/// rounded. A category with no rows contributes zero.
pub fn summarize(rows: &[CategoryTotal]) -> TransactionSummary {
    let mut income = BigDecimal::zero();
    let mut expense = BigDecimal::zero();

    for row in rows {
        match row.category {
            Category::Income => income += row.total.clone(),
            Category::Expense => expense += row.total.clone(),
        }
    }

    let balance = &income - &expense;
    TransactionSummary {
        total_income: round_currency(&income),
        total_expense: round_currency(&expense),
        balance: round_currency(&balance),
    }
}

/// Number of transactions behind a set of grouped totals.
pub fn transaction_count(rows: &[CategoryTotal]) -> i64 {
    rows.iter().map(|row| row.count).sum()
}
