// In crates/ledger/tests/engine_trades.rs

use std::sync::Arc;

use chrono::Utc;
use core_types::{Error, Position, Symbol};
use ledger::memory::{MemoryLedgerStore, MemoryPriceOracle};
use ledger::{LedgerEngine, LedgerStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const STARTING_CASH: Decimal = dec!(1_000_000);

fn sym(s: &str) -> Symbol {
    Symbol(s.to_string())
}

fn fixture() -> (Arc<MemoryLedgerStore>, Arc<MemoryPriceOracle>) {
    (
        Arc::new(MemoryLedgerStore::new()),
        Arc::new(MemoryPriceOracle::new()),
    )
}

async fn engine_over(
    store: &Arc<MemoryLedgerStore>,
    oracle: &Arc<MemoryPriceOracle>,
) -> LedgerEngine {
    LedgerEngine::load(store.clone(), oracle.clone(), STARTING_CASH)
        .await
        .expect("hydration over the memory store succeeds")
}

#[tokio::test]
async fn buy_average_up_and_close_out_keeps_the_ledger_consistent() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");

    oracle.set_price(&aapl, dec!(150));
    let summary = engine.buy(&aapl, dec!(100)).await.unwrap();
    assert_eq!(summary.cash, dec!(985_000));
    assert_eq!(summary.holdings[&aapl].quantity, dec!(100));
    assert_eq!(summary.holdings[&aapl].avg_price, dec!(150));
    assert_eq!(summary.unrealized_pnl, dec!(0));

    oracle.set_price(&aapl, dec!(180));
    let summary = engine.buy(&aapl, dec!(50)).await.unwrap();
    assert_eq!(summary.cash, dec!(976_000));
    assert_eq!(summary.holdings[&aapl].quantity, dec!(150));
    assert_eq!(summary.holdings[&aapl].avg_price, dec!(160));
    assert_eq!(summary.unrealized_pnl, dec!(3_000)); // (180 - 160) * 150
    assert_eq!(engine.compute_unrealized_pnl().await.unwrap(), dec!(3_000));

    oracle.set_price(&aapl, dec!(200));
    let summary = engine.sell(&aapl, dec!(150)).await.unwrap();
    assert_eq!(summary.cash, dec!(1_006_000));
    assert!(summary.holdings.is_empty());
    assert_eq!(summary.unrealized_pnl, dec!(0));
    assert_eq!(summary.total, dec!(1_006_000));

    assert!(store.position_for(&aapl).is_none());
    let account = store.account().unwrap();
    assert_eq!(account.cash, dec!(1_006_000));
    assert_eq!(account.version, 3);

    // Every committed trade also writes today's snapshot.
    let snapshot = store.snapshot_for(Utc::now().date_naive()).unwrap();
    assert_eq!(snapshot.cash, dec!(1_006_000));
    assert_eq!(snapshot.total, dec!(1_006_000));
}

#[tokio::test]
async fn spending_exactly_all_cash_is_allowed() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let voo = sym("VOO");
    oracle.set_price(&voo, dec!(100));

    let summary = engine.buy(&voo, dec!(10_000)).await.unwrap();
    assert_eq!(summary.cash, dec!(0));
    // Total tracks cash plus paper P&L, not position market value.
    assert_eq!(summary.unrealized_pnl, dec!(0));
    assert_eq!(summary.total, dec!(0));
}

#[tokio::test]
async fn a_buy_larger_than_cash_is_refused() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");
    oracle.set_price(&aapl, dec!(150));

    let err = engine.buy(&aapl, dec!(10_000)).await.unwrap_err();
    match err {
        Error::InsufficientFunds { needed, available } => {
            assert_eq!(needed, dec!(1_500_000));
            assert_eq!(available, STARTING_CASH);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_eq!(engine.book().cash, STARTING_CASH);
    assert!(store.account().is_none());
}

#[tokio::test]
async fn an_eleventh_distinct_symbol_is_refused() {
    let (store, oracle) = fixture();
    for i in 0..10 {
        let symbol = sym(&format!("SYM{i}"));
        oracle.set_price(&symbol, dec!(10));
        store
            .upsert_position(&Position {
                symbol: symbol.clone(),
                quantity: dec!(1),
                avg_price: dec!(10),
            })
            .await
            .unwrap();
    }
    let mut engine = engine_over(&store, &oracle).await;

    let extra = sym("EXTRA");
    oracle.set_price(&extra, dec!(10));
    let err = engine.buy(&extra, dec!(1)).await.unwrap_err();
    assert!(matches!(err, Error::LimitExceeded { max: 10 }));
    assert!(store.position_for(&extra).is_none());
    assert_eq!(store.snapshot_count(), 0);

    // Topping up a symbol already held at the limit is still allowed.
    let held = sym("SYM0");
    let summary = engine.buy(&held, dec!(1)).await.unwrap();
    assert_eq!(summary.holdings[&held].quantity, dec!(2));
}

#[tokio::test]
async fn selling_with_no_position_is_refused() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    oracle.set_price(&sym("AAPL"), dec!(150));

    let err = engine.sell(&sym("AAPL"), dec!(10)).await.unwrap_err();
    match err {
        Error::InsufficientShares { held, requested, .. } => {
            assert_eq!(held, dec!(0));
            assert_eq!(requested, dec!(10));
        }
        other => panic!("expected InsufficientShares, got {other:?}"),
    }
    assert!(store.account().is_none());
}

#[tokio::test]
async fn selling_more_than_held_is_refused() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");
    oracle.set_price(&aapl, dec!(150));
    engine.buy(&aapl, dec!(10)).await.unwrap();

    let err = engine.sell(&aapl, dec!(11)).await.unwrap_err();
    match err {
        Error::InsufficientShares { held, requested, .. } => {
            assert_eq!(held, dec!(10));
            assert_eq!(requested, dec!(11));
        }
        other => panic!("expected InsufficientShares, got {other:?}"),
    }
    assert_eq!(engine.book().positions[&aapl].quantity, dec!(10));
}

#[tokio::test]
async fn non_positive_quantities_are_refused() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    oracle.set_price(&sym("AAPL"), dec!(150));

    for quantity in [dec!(0), dec!(-5)] {
        let err = engine.buy(&sym("AAPL"), quantity).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        let err = engine.sell(&sym("AAPL"), quantity).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}

#[tokio::test]
async fn a_blank_symbol_is_refused() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;

    for name in ["", "   "] {
        let err = engine.buy(&sym(name), dec!(1)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}

#[tokio::test]
async fn values_exceeding_decimal_range_are_refused() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");
    oracle.set_price(&aapl, dec!(150));

    // The gross value overflows before anything is staged or written.
    let err = engine.buy(&aapl, Decimal::MAX).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert_eq!(engine.book().cash, STARTING_CASH);
    assert!(store.account().is_none());

    // An absurd recorded price blocks the cash credit on a sale.
    engine.buy(&aapl, dec!(10)).await.unwrap();
    oracle.set_price(&aapl, Decimal::MAX);
    let err = engine.sell(&aapl, dec!(1)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert_eq!(engine.book().positions[&aapl].quantity, dec!(10));
    assert_eq!(store.position_for(&aapl).unwrap().quantity, dec!(10));

    // Marking to market at that price is refused the same way.
    let err = engine.portfolio_summary().await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
}

#[tokio::test]
async fn a_symbol_with_no_price_history_cannot_be_traded() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;

    let err = engine.buy(&sym("GME"), dec!(1)).await.unwrap_err();
    assert!(matches!(err, Error::PriceUnavailable { .. }));
    assert!(store.account().is_none());
    assert_eq!(store.snapshot_count(), 0);
}

#[tokio::test]
async fn a_holding_without_a_price_blocks_marking_to_market() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");
    let msft = sym("MSFT");
    oracle.set_price(&aapl, dec!(150));
    oracle.set_price(&msft, dec!(300));
    engine.buy(&aapl, dec!(10)).await.unwrap();
    engine.buy(&msft, dec!(10)).await.unwrap();

    oracle.clear_price(&msft);

    // P&L is all-or-nothing rather than silently partial.
    let err = engine.portfolio_summary().await.unwrap_err();
    assert!(matches!(err, Error::PriceUnavailable { symbol } if symbol == "MSFT"));
    let err = engine.compute_unrealized_pnl().await.unwrap_err();
    assert!(matches!(err, Error::PriceUnavailable { .. }));

    // Even a trade in a fully priced symbol fails, and changes nothing.
    let err = engine.buy(&aapl, dec!(1)).await.unwrap_err();
    assert!(matches!(err, Error::PriceUnavailable { .. }));
    assert_eq!(store.position_for(&aapl).unwrap().quantity, dec!(10));
    assert_eq!(engine.book().positions[&aapl].quantity, dec!(10));
}

#[tokio::test]
async fn snapshots_on_the_same_day_replace_each_other() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");
    oracle.set_price(&aapl, dec!(150));

    engine.buy(&aapl, dec!(10)).await.unwrap();
    engine.update_daily_pnl().await.unwrap();
    oracle.set_price(&aapl, dec!(170));
    engine.update_daily_pnl().await.unwrap();

    assert_eq!(store.snapshot_count(), 1);
    let snapshot = store.snapshot_for(Utc::now().date_naive()).unwrap();
    assert_eq!(snapshot.unrealized_pnl, dec!(200)); // (170 - 150) * 10
    assert_eq!(snapshot.total, snapshot.cash + snapshot.unrealized_pnl);
}

#[tokio::test]
async fn marking_an_empty_portfolio_records_starting_cash() {
    let (store, oracle) = fixture();
    let engine = engine_over(&store, &oracle).await;

    let summary = engine.update_daily_pnl().await.unwrap();
    assert_eq!(summary.cash, STARTING_CASH);
    assert_eq!(summary.unrealized_pnl, dec!(0));
    assert_eq!(summary.total, STARTING_CASH);

    let snapshot = store.snapshot_for(Utc::now().date_naive()).unwrap();
    assert_eq!(snapshot.total, STARTING_CASH);
}

#[tokio::test]
async fn a_failed_commit_leaves_the_session_and_store_untouched() {
    let (store, oracle) = fixture();
    let mut engine = engine_over(&store, &oracle).await;
    let aapl = sym("AAPL");
    oracle.set_price(&aapl, dec!(150));
    engine.buy(&aapl, dec!(100)).await.unwrap();

    store.fail_writes(true);
    let err = engine.sell(&aapl, dec!(50)).await.unwrap_err();
    assert!(matches!(err, Error::Store { .. }));
    assert_eq!(engine.book().cash, dec!(985_000));
    assert_eq!(engine.book().positions[&aapl].quantity, dec!(100));
    assert_eq!(store.position_for(&aapl).unwrap().quantity, dec!(100));

    // The same session can retry once the store recovers.
    store.fail_writes(false);
    let summary = engine.sell(&aapl, dec!(50)).await.unwrap();
    assert_eq!(summary.cash, dec!(992_500));
    assert_eq!(summary.holdings[&aapl].quantity, dec!(50));
}

#[tokio::test]
async fn a_new_session_picks_up_state_left_by_the_previous_one() {
    let (store, oracle) = fixture();
    let aapl = sym("AAPL");
    oracle.set_price(&aapl, dec!(150));

    let mut first = engine_over(&store, &oracle).await;
    first.buy(&aapl, dec!(100)).await.unwrap();
    drop(first);

    let mut second = engine_over(&store, &oracle).await;
    assert_eq!(second.book().cash, dec!(985_000));
    let summary = second.sell(&aapl, dec!(100)).await.unwrap();
    assert_eq!(summary.cash, STARTING_CASH);
}

#[tokio::test]
async fn racing_sessions_serialize_through_the_version_check() {
    let (store, oracle) = fixture();
    let aapl = sym("AAPL");
    let msft = sym("MSFT");
    oracle.set_price(&aapl, dec!(150));
    oracle.set_price(&msft, dec!(300));

    // Both sessions hydrate the same initial state before either trades.
    let mut first = engine_over(&store, &oracle).await;
    let mut second = engine_over(&store, &oracle).await;

    first.buy(&aapl, dec!(100)).await.unwrap();
    // The second session holds a stale version; its first commit is
    // refused, then re-hydrated and retried internally.
    let summary = second.buy(&msft, dec!(10)).await.unwrap();

    assert_eq!(summary.cash, dec!(982_000)); // both debits applied
    let account = store.account().unwrap();
    assert_eq!(account.cash, dec!(982_000));
    assert_eq!(account.version, 2);
    assert_eq!(store.position_for(&aapl).unwrap().quantity, dec!(100));
    assert_eq!(store.position_for(&msft).unwrap().quantity, dec!(10));
}
