//! Integration tests for the scoring engine

use clientpulse_core::ScoringConfig;
use clientpulse_scoring::{BillingSignals, ScoringEngine, SubscriptionSignals};
use pretty_assertions::assert_eq;

fn engine() -> ScoringEngine {
    ScoringEngine::new(ScoringConfig::default())
}

fn healthy_subscription() -> SubscriptionSignals {
    SubscriptionSignals {
        account_id: "acct-1".into(),
        payment_method: Some("card".into()),
        plan_tier: Some("premium".into()),
        active_services: 10,
        tenure_months: Some(24),
        subscription_amount: 500.0,
    }
}

fn clean_billing() -> BillingSignals {
    BillingSignals {
        account_id: "acct-1".into(),
        failed_transactions: 0,
        credit_amount: 0.0,
    }
}

#[test]
fn worked_example_scores_65_8() {
    // card 50 + failures 0 + services 10 + premium 15 + tenure 24/6=4 = 79
    let health = engine().score_account("acct-1", Some(&healthy_subscription()), Some(&clean_billing()));

    assert_eq!(health.factors.payment_method, 50.0);
    assert_eq!(health.factors.transaction_failures, 0.0);
    assert_eq!(health.factors.service_engagement, 10.0);
    assert_eq!(health.factors.plan_tier, 15.0);
    assert_eq!(health.factors.tenure, 4.0);

    assert_eq!(health.health_score, 65.8);
    assert_eq!(health.churn_probability, 34.2);
    assert_eq!(health.cns, 52.6);
    assert_eq!(health.mrr, 500.0);
    assert!(health.diagnostics.is_empty());
}

#[test]
fn health_never_increases_with_failures() {
    let subscription = healthy_subscription();
    let mut previous_health = f64::MAX;
    let mut previous_churn = f64::MIN;

    for failures in 0..8 {
        let billing = BillingSignals {
            failed_transactions: failures,
            ..clean_billing()
        };
        let health = engine().score_account("acct-1", Some(&subscription), Some(&billing));

        assert!(health.health_score <= previous_health);
        assert!(health.churn_probability >= previous_churn);
        assert!((0.0..=100.0).contains(&health.health_score));
        assert!((0.0..=100.0).contains(&health.churn_probability));

        previous_health = health.health_score;
        previous_churn = health.churn_probability;
    }
}

#[test]
fn factor_caps_hold_under_extreme_inputs() {
    let subscription = SubscriptionSignals {
        active_services: 10_000,
        tenure_months: Some(1_200),
        ..healthy_subscription()
    };
    let health = engine().score_account("acct-1", Some(&subscription), Some(&clean_billing()));

    assert_eq!(health.factors.service_engagement, 25.0);
    assert_eq!(health.factors.tenure, 20.0);
    assert!(health.health_score <= 100.0);
}

#[test]
fn negative_mrr_is_clamped_and_flagged() {
    let subscription = SubscriptionSignals {
        subscription_amount: 50.0,
        ..healthy_subscription()
    };
    let billing = BillingSignals {
        credit_amount: 80.0,
        ..clean_billing()
    };
    let health = engine().score_account("acct-1", Some(&subscription), Some(&billing));

    assert_eq!(health.mrr, 0.0);
    assert!(health
        .diagnostics
        .iter()
        .any(|d| d.code.as_str() == "DATA_QUALITY_NEGATIVE_MRR"));
}

#[test]
fn missing_billing_degrades_to_zero_signals() {
    let health = engine().score_account("acct-1", Some(&healthy_subscription()), None);

    assert_eq!(health.factors.transaction_failures, 0.0);
    assert_eq!(health.health_score, 65.8);
    assert!(health
        .diagnostics
        .iter()
        .any(|d| d.code.as_str() == "DATA_QUALITY_UNJOINABLE_ACCOUNT"));
}

#[test]
fn account_missing_everywhere_gets_all_zero_record() {
    let health = engine().score_account("ghost", None, None);

    assert_eq!(health.health_score, 0.0);
    assert_eq!(health.churn_probability, 0.0);
    assert_eq!(health.cns, 0.0);
    assert_eq!(health.mrr, 0.0);
    assert!(!health.explanation.is_empty());
}

#[test]
fn missing_inputs_are_explained_not_errors() {
    let subscription = SubscriptionSignals {
        payment_method: None,
        plan_tier: None,
        tenure_months: None,
        ..healthy_subscription()
    };
    let health = engine().score_account("acct-1", Some(&subscription), Some(&clean_billing()));

    // Only service engagement contributes: 10/120*100 = 8.3
    assert_eq!(health.health_score, 8.3);
    assert!(health
        .explanation
        .iter()
        .any(|line| line.contains("payment method unknown")));
    let missing = health
        .diagnostics
        .iter()
        .filter(|d| d.code.as_str() == "SCORE_FACTOR_MISSING")
        .count();
    assert_eq!(missing, 3);
}

#[test]
fn join_is_subscription_authoritative() {
    let subscriptions = vec![healthy_subscription()];
    let billing = vec![
        clean_billing(),
        // No subscription counterpart: must not produce a record
        BillingSignals {
            account_id: "acct-billing-only".into(),
            failed_transactions: 5,
            credit_amount: 0.0,
        },
    ];

    let scored = engine().score_all(&subscriptions, &billing);
    assert_eq!(scored.len(), 1);
    assert_eq!(scored[0].account_id, "acct-1");
}
