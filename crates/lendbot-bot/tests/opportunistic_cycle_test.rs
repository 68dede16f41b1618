//! Opportunistic pass against the scripted exchange.

mod integration;
use integration::common::fixtures::*;

use lendbot_bot::{OperatingMode, OpportunityOutcome};
use lendbot_core::{Amount, OfferOrigin, ProtectionKey, Rate};
use lendbot_exchange::ExchangeCall;
use lendbot_telemetry::metrics::OPPORTUNITIES_TOTAL;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_executes_and_protects_period() {
    let mock = scripted_exchange(opportunity_book(), 1_000);
    let app = app(&mock, OperatingMode::Trading);

    let reports = app.opportunistic().run_all_at(NOW_MS).await.unwrap();
    let report = &reports[0];
    assert!(report.is_ok());

    let OpportunityOutcome::Executed {
        plan,
        offer_id,
        notable,
        freed,
        ..
    } = &report.outcome
    else {
        panic!("expected execution, got {:?}", report.outcome);
    };
    // 0.0012 * 0.999, sized at min(1000 * 0.3, 20000 * 0.8)
    assert_eq!(plan.rate, Rate::new(dec!(0.0011988)));
    assert_eq!(plan.amount, Amount::from(300));
    assert_eq!(plan.period_days, 30);
    assert!(offer_id.is_some());
    assert!(*notable);
    assert!(freed.is_none());

    let submitted = mock.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].origin, OfferOrigin::Opportunistic);
    assert!(app
        .state()
        .protection
        .is_protected(&ProtectionKey::new(usd(), 30), NOW_MS + 299_999));
    assert!(!app
        .state()
        .protection
        .is_protected(&ProtectionKey::new(usd(), 30), NOW_MS + 300_000));
}

#[tokio::test]
async fn test_same_borrower_not_acted_on_twice() {
    let mock = scripted_exchange(opportunity_book(), 1_000);
    let app = app(&mock, OperatingMode::Trading);

    app.opportunistic().run_all_at(NOW_MS).await.unwrap();
    let reports = app.opportunistic().run_all_at(NOW_MS + 10_000).await.unwrap();

    assert!(matches!(reports[0].outcome, OpportunityOutcome::NoOpportunity));
    assert_eq!(reports[0].scan.skipped_tracked, 1);
    assert_eq!(mock.submitted().len(), 1);
}

#[tokio::test]
async fn test_frees_cheapest_offer_when_short_of_funds() {
    let mock = scripted_exchange(opportunity_book(), 100);
    let cheap = mock.insert_offer(&usd(), Rate::new(dec!(0.0003)), 2, Amount::from(500));
    let app = app(&mock, OperatingMode::Trading);

    let reports = app.opportunistic().run_all_at(NOW_MS).await.unwrap();
    let OpportunityOutcome::Executed { plan, freed, .. } = &reports[0].outcome else {
        panic!("expected execution, got {:?}", reports[0].outcome);
    };
    assert_eq!(freed.as_ref().map(|o| o.id), Some(cheap));
    // (100 + 500) * 0.3
    assert_eq!(plan.amount, Amount::from(180));
    assert_eq!(mock.cancelled(), vec![cheap]);
}

#[tokio::test]
async fn test_insufficient_funds_without_cheaper_offer() {
    let mock = scripted_exchange(opportunity_book(), 100);
    let app = app(&mock, OperatingMode::Trading);

    let reports = app.opportunistic().run_all_at(NOW_MS).await.unwrap();
    assert!(matches!(
        reports[0].outcome,
        OpportunityOutcome::InsufficientFunds { .. }
    ));
    assert!(mock.submitted().is_empty());
    assert!(app.state().protection.is_empty());
}

#[tokio::test]
async fn test_ladder_pass_keeps_opportunistic_offer() {
    let mock = scripted_exchange(opportunity_book(), 10_000);
    let app = app(&mock, OperatingMode::Trading);

    app.opportunistic().run_all_at(NOW_MS).await.unwrap();
    let placed = mock.offers(&usd())[0].id;

    let reports = app
        .strategy()
        .run_all_at(quiet_hour(), NOW_MS + 60_000)
        .await
        .unwrap();
    assert!(reports[0].is_ok());
    assert_eq!(reports[0].protected, 1);
    assert!(!mock.cancelled().contains(&placed));
}

#[tokio::test]
async fn test_observation_mode_never_mutates() {
    let mock = scripted_exchange(opportunity_book(), 10_000);
    mock.insert_offer(&usd(), Rate::new(dec!(0.0001)), 2, Amount::from(500));
    let app = app(&mock, OperatingMode::Observation);

    let observed_before = OPPORTUNITIES_TOTAL
        .with_label_values(&["USD", "observed"])
        .get();

    app.startup().await;
    let strategy = app.strategy().run_all_at(at(6, 6), NOW_MS).await.unwrap();
    let opportunistic = app.opportunistic().run_all_at(NOW_MS).await.unwrap();

    assert!(!strategy[0].levels.is_empty());
    let OpportunityOutcome::Observed { plan, .. } = &opportunistic[0].outcome else {
        panic!("expected observation, got {:?}", opportunistic[0].outcome);
    };
    assert_eq!(plan.rate, Rate::new(dec!(0.0011988)));
    assert_eq!(plan.period_days, 30);
    assert!(
        OPPORTUNITIES_TOTAL
            .with_label_values(&["USD", "observed"])
            .get()
            >= observed_before + 1.0
    );
    assert!(mock.calls().iter().all(|c| !matches!(
        c,
        ExchangeCall::Submit { .. } | ExchangeCall::Cancel(_) | ExchangeCall::CancelAll(_)
    )));
    assert_eq!(mock.offers(&usd()).len(), 1);
    assert_eq!(mock.balance(&usd()), Amount::from(10_000));
}

#[tokio::test]
async fn test_origin_tag_survives_listing_taken_before_submit() {
    let mock = scripted_exchange(opportunity_book(), 10_000);
    let app = app(&mock, OperatingMode::Trading);

    // A ladder listing is requested, the opportunistic offer lands, then the
    // listing returns without it.
    let stale = app.state().offers.listing_ticket();
    app.opportunistic().run_all_at(NOW_MS).await.unwrap();
    let placed = mock.offers(&usd())[0].id;
    app.state().offers.refresh(&usd(), stale, Vec::new());

    let reports = app
        .strategy()
        .run_all_at(quiet_hour(), NOW_MS + 60_000)
        .await
        .unwrap();
    assert!(reports[0].is_ok());
    assert_eq!(reports[0].resting_opportunistic, 1);
    assert!(!mock.cancelled().contains(&placed));
}
