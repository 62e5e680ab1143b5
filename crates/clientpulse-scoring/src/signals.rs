//! Scoring inputs and their extraction from warehouse row sets

use clientpulse_connector::QueryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-account subscription facts (the authoritative side of the join)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSignals {
    /// Join key across both row sets
    pub account_id: String,

    /// Payment method on file, if known (card / check / cash / wire)
    pub payment_method: Option<String>,

    /// Plan tier, if known (premium / standard / ...)
    pub plan_tier: Option<String>,

    /// Count of active services on the subscription
    pub active_services: u32,

    /// Months since the subscription started, if known
    pub tenure_months: Option<u32>,

    /// Monthly subscription amount
    pub subscription_amount: f64,
}

/// Per-account billing facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSignals {
    /// Join key across both row sets
    pub account_id: String,

    /// Failed transactions in the trailing window supplied by the caller
    pub failed_transactions: u32,

    /// Outstanding credit deducted from MRR
    pub credit_amount: f64,
}

impl BillingSignals {
    /// Zero-valued billing for an account with no billing row
    pub fn empty(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            failed_transactions: 0,
            credit_amount: 0.0,
        }
    }
}

/// Build subscription signals from a row set keyed by `account_id`
///
/// Rows without an `account_id` value are dropped. All other columns are
/// optional; absent or mistyped cells become the zero value of the field.
pub fn subscription_signals_from(result: &QueryResult) -> Vec<SubscriptionSignals> {
    result
        .rows
        .iter()
        .enumerate()
        .filter_map(|(idx, _)| {
            let account_id = string_cell(result, idx, "account_id")?;
            Some(SubscriptionSignals {
                account_id,
                payment_method: string_cell(result, idx, "payment_method"),
                plan_tier: string_cell(result, idx, "plan_tier"),
                active_services: count_cell(result, idx, "active_services"),
                tenure_months: result
                    .value(idx, "tenure_months")
                    .and_then(value_as_count),
                subscription_amount: amount_cell(result, idx, "subscription_amount"),
            })
        })
        .collect()
}

/// Build billing signals from a row set keyed by `account_id`
pub fn billing_signals_from(result: &QueryResult) -> Vec<BillingSignals> {
    result
        .rows
        .iter()
        .enumerate()
        .filter_map(|(idx, _)| {
            let account_id = string_cell(result, idx, "account_id")?;
            Some(BillingSignals {
                account_id,
                failed_transactions: count_cell(result, idx, "failed_transactions"),
                credit_amount: amount_cell(result, idx, "credit_amount"),
            })
        })
        .collect()
}

fn string_cell(result: &QueryResult, row: usize, column: &str) -> Option<String> {
    match result.value(row, column)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_cell(result: &QueryResult, row: usize, column: &str) -> u32 {
    result
        .value(row, column)
        .and_then(value_as_count)
        .unwrap_or(0)
}

fn amount_cell(result: &QueryResult, row: usize, column: &str) -> f64 {
    result
        .value(row, column)
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn value_as_count(value: &Value) -> Option<u32> {
    value.as_u64().map(|n| n.min(u32::MAX as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription_rows() -> QueryResult {
        QueryResult {
            columns: vec![
                "account_id".into(),
                "payment_method".into(),
                "plan_tier".into(),
                "active_services".into(),
                "tenure_months".into(),
                "subscription_amount".into(),
            ],
            rows: vec![
                vec![
                    serde_json::json!("acct-1"),
                    serde_json::json!("card"),
                    serde_json::json!("premium"),
                    serde_json::json!(10),
                    serde_json::json!(24),
                    serde_json::json!(500.0),
                ],
                vec![
                    serde_json::json!("acct-2"),
                    Value::Null,
                    Value::Null,
                    serde_json::json!(2),
                    Value::Null,
                    serde_json::json!(99.0),
                ],
                // No account id: the row is unjoinable and dropped here
                vec![
                    Value::Null,
                    serde_json::json!("card"),
                    Value::Null,
                    serde_json::json!(1),
                    Value::Null,
                    serde_json::json!(10.0),
                ],
            ],
        }
    }

    #[test]
    fn extracts_complete_and_sparse_rows() {
        let signals = subscription_signals_from(&subscription_rows());
        assert_eq!(signals.len(), 2);

        assert_eq!(signals[0].payment_method.as_deref(), Some("card"));
        assert_eq!(signals[0].tenure_months, Some(24));
        assert_eq!(signals[0].subscription_amount, 500.0);

        assert_eq!(signals[1].payment_method, None);
        assert_eq!(signals[1].tenure_months, None);
        assert_eq!(signals[1].active_services, 2);
    }

    #[test]
    fn numeric_account_ids_are_stringified() {
        let result = QueryResult {
            columns: vec!["account_id".into(), "failed_transactions".into()],
            rows: vec![vec![serde_json::json!(42), serde_json::json!(3)]],
        };
        let signals = billing_signals_from(&result);
        assert_eq!(signals[0].account_id, "42");
        assert_eq!(signals[0].failed_transactions, 3);
    }

    #[test]
    fn missing_columns_become_zero_values() {
        let result = QueryResult {
            columns: vec!["account_id".into()],
            rows: vec![vec![serde_json::json!("acct-9")]],
        };
        let billing = billing_signals_from(&result);
        assert_eq!(billing[0].failed_transactions, 0);
        assert_eq!(billing[0].credit_amount, 0.0);
    }
}
