//! Factor computation and score assembly

use crate::signals::{BillingSignals, SubscriptionSignals};
use clientpulse_core::{Diagnostic, DiagnosticCode, ScoringConfig, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Maximum attainable factor sum; health is reported as a share of this
const FACTOR_CEILING: f64 = 120.0;

const PAYMENT_CARD: f64 = 50.0;
const PAYMENT_CHECK: f64 = 30.0;
const PAYMENT_CASH_OR_WIRE: f64 = 10.0;
const FAILURE_PENALTY: f64 = 20.0;
const ENGAGEMENT_CAP: f64 = 25.0;
const PLAN_PREMIUM: f64 = 15.0;
const PLAN_STANDARD: f64 = 10.0;
const PLAN_OTHER: f64 = 5.0;
const TENURE_CAP: f64 = 20.0;

/// Per-factor contributions, before the zero floor and normalization
///
/// `transaction_failures` is the only factor that can go negative; the
/// combined sum is floored at zero when the health score is derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub payment_method: f64,
    pub transaction_failures: f64,
    pub service_engagement: f64,
    pub plan_tier: f64,
    pub tenure: f64,
}

impl FactorBreakdown {
    /// Combined factor sum, floored at zero
    pub fn sum(&self) -> f64 {
        let raw = self.payment_method
            + self.transaction_failures
            + self.service_engagement
            + self.plan_tier
            + self.tenure;
        raw.max(0.0)
    }
}

/// The scored view of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountHealth {
    pub account_id: String,

    /// 0..=100, one decimal
    pub health_score: f64,

    /// 0..=100, one decimal
    pub churn_probability: f64,

    /// Customer net score: health after the fixed display discount
    pub cns: f64,

    /// Monthly recurring revenue, never negative
    pub mrr: f64,

    pub factors: FactorBreakdown,

    /// One line per factor, including which inputs were unavailable
    pub explanation: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Stateless scoring engine
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score every account in the subscription row set
    ///
    /// The subscription side is authoritative for the join: billing rows
    /// without a subscription counterpart are ignored, and subscriptions
    /// without billing degrade to zero-valued billing signals.
    pub fn score_all(
        &self,
        subscriptions: &[SubscriptionSignals],
        billing: &[BillingSignals],
    ) -> Vec<AccountHealth> {
        let billing_by_account: HashMap<&str, &BillingSignals> = billing
            .iter()
            .map(|b| (b.account_id.as_str(), b))
            .collect();

        subscriptions
            .iter()
            .map(|sub| {
                self.score_account(
                    &sub.account_id,
                    Some(sub),
                    billing_by_account.get(sub.account_id.as_str()).copied(),
                )
            })
            .collect()
    }

    /// Score a single account from whatever signals are available
    ///
    /// Never errors: an account absent from both row sets yields an
    /// explicit all-zero record.
    pub fn score_account(
        &self,
        account_id: &str,
        subscription: Option<&SubscriptionSignals>,
        billing: Option<&BillingSignals>,
    ) -> AccountHealth {
        let mut explanation = Vec::new();
        let mut diagnostics = Vec::new();

        let Some(subscription) = subscription else {
            return self.unscored(account_id, billing.is_some());
        };

        let billing_owned;
        let billing = match billing {
            Some(billing) => billing,
            None => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::DataQualityUnjoinableAccount,
                        Severity::Warn,
                        "no billing row joined; billing signals treated as zero",
                    )
                    .with_subject(account_id),
                );
                billing_owned = BillingSignals::empty(account_id);
                &billing_owned
            }
        };

        let factors = self.factors(subscription, billing, &mut explanation, &mut diagnostics);

        let health = round1((factors.sum() / FACTOR_CEILING * 100.0).clamp(0.0, 100.0));
        let failure_boost = (self.config.failure_boost_per_failure
            * f64::from(billing.failed_transactions))
        .min(self.config.failure_boost_cap);
        let churn = round1((100.0 - health + failure_boost).clamp(0.0, 100.0));
        let cns = round1(health * self.config.cns_discount);

        let raw_mrr = subscription.subscription_amount - billing.credit_amount;
        if raw_mrr < 0.0 {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::DataQualityNegativeMrr,
                    Severity::Warn,
                    format!("credit exceeds subscription amount by {:.2}", -raw_mrr),
                )
                .with_subject(account_id),
            );
        }

        debug!(account_id, health, churn, "scored account");

        AccountHealth {
            account_id: account_id.to_string(),
            health_score: health,
            churn_probability: churn,
            cns,
            mrr: raw_mrr.max(0.0),
            factors,
            explanation,
            diagnostics,
        }
    }

    fn factors(
        &self,
        subscription: &SubscriptionSignals,
        billing: &BillingSignals,
        explanation: &mut Vec<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> FactorBreakdown {
        let mut factors = FactorBreakdown::default();

        match subscription.payment_method.as_deref() {
            Some(method) => {
                factors.payment_method = payment_points(method).min(PAYMENT_CARD);
                explanation.push(format!(
                    "payment method '{}' contributes {}",
                    method, factors.payment_method
                ));
            }
            None => {
                explanation.push("payment method unknown, contributes 0".to_string());
                diagnostics.push(factor_missing(&subscription.account_id, "payment_method"));
            }
        }

        factors.transaction_failures =
            -FAILURE_PENALTY * f64::from(billing.failed_transactions);
        explanation.push(format!(
            "{} failed transactions contribute {}",
            billing.failed_transactions, factors.transaction_failures
        ));

        factors.service_engagement = f64::from(subscription.active_services).min(ENGAGEMENT_CAP);
        explanation.push(format!(
            "{} active services contribute {}",
            subscription.active_services, factors.service_engagement
        ));

        match subscription.plan_tier.as_deref() {
            Some(tier) => {
                factors.plan_tier = plan_points(tier);
                explanation.push(format!(
                    "plan tier '{}' contributes {}",
                    tier, factors.plan_tier
                ));
            }
            None => {
                explanation.push("plan tier unknown, contributes 0".to_string());
                diagnostics.push(factor_missing(&subscription.account_id, "plan_tier"));
            }
        }

        match subscription.tenure_months {
            Some(months) => {
                factors.tenure = f64::from(months / 6).min(TENURE_CAP);
                explanation.push(format!(
                    "{} months of tenure contribute {}",
                    months, factors.tenure
                ));
            }
            None => {
                explanation.push("tenure unknown, contributes 0".to_string());
                diagnostics.push(factor_missing(&subscription.account_id, "tenure_months"));
            }
        }

        factors
    }

    /// All-zero record for an account with no usable signals
    fn unscored(&self, account_id: &str, had_billing: bool) -> AccountHealth {
        let message = if had_billing {
            "billing row present but no subscription row; account not scorable"
        } else {
            "account absent from both signal row sets"
        };
        AccountHealth {
            account_id: account_id.to_string(),
            health_score: 0.0,
            churn_probability: 0.0,
            cns: 0.0,
            mrr: 0.0,
            factors: FactorBreakdown::default(),
            explanation: vec![message.to_string()],
            diagnostics: vec![Diagnostic::new(
                DiagnosticCode::DataQualityUnjoinableAccount,
                Severity::Warn,
                message,
            )
            .with_subject(account_id)],
        }
    }
}

fn payment_points(method: &str) -> f64 {
    match method.to_lowercase().as_str() {
        "card" | "credit_card" | "credit card" => PAYMENT_CARD,
        "check" => PAYMENT_CHECK,
        "cash" | "wire" => PAYMENT_CASH_OR_WIRE,
        _ => 0.0,
    }
}

fn plan_points(tier: &str) -> f64 {
    match tier.to_lowercase().as_str() {
        "premium" => PLAN_PREMIUM,
        "standard" => PLAN_STANDARD,
        _ => PLAN_OTHER,
    }
}

fn factor_missing(account_id: &str, field: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::ScoreFactorMissing,
        Severity::Info,
        format!("input '{}' unavailable; factor contributes 0", field),
    )
    .with_subject(account_id)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
