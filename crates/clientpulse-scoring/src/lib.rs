//! Health and churn scoring engine
//!
//! A pure per-account computation: subscription and billing signals in,
//! `AccountHealth` out. No state is carried between calls and no score is
//! ever persisted. Missing inputs degrade individual factors to zero with
//! an explanation line, never an error.

pub mod engine;
pub mod signals;

pub use engine::{AccountHealth, FactorBreakdown, ScoringEngine};
pub use signals::{billing_signals_from, subscription_signals_from, BillingSignals, SubscriptionSignals};
