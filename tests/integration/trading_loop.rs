//! End-to-end trading loop scenarios against the in-memory broker.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use rebalancer::config::{AppConfig, StrategyConfig};
use rebalancer::engine::{self, trader::TradingLoop, LoopKind};
use rebalancer::strategy::RunningProfit;
use rebalancer::types::{AssetConfig, AssetKind, OrderSide};

use crate::mock_broker::{MockBroker, Op};

const TICK: Duration = Duration::from_millis(2);

fn eth_loop(broker: &MockBroker) -> TradingLoop {
    TradingLoop::new(
        AssetConfig::new("ETH", AssetKind::Crypto, dec!(30.00)),
        Arc::new(broker.clone()),
        StrategyConfig::default(),
        TICK,
    )
}

#[tokio::test]
async fn test_flat_market_does_nothing() {
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(30));
    let mut tl = eth_loop(&broker);

    for _ in 0..5 {
        let report = tl.run_iteration().await;
        assert_eq!(report.sold, None);
        assert_eq!(report.bought, None);
    }
    assert!(broker.orders().is_empty());
    assert_eq!(tl.profit().value(), Decimal::ZERO);
}

#[tokio::test]
async fn test_each_check_reads_a_fresh_quote() {
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(30));
    let mut tl = eth_loop(&broker);

    tl.run_iteration().await;
    assert_eq!(broker.quote_calls(), 2);
    tl.run_iteration().await;
    assert_eq!(broker.quote_calls(), 4);
}

#[tokio::test]
async fn test_rise_sells_excess_back_to_core() {
    // 4 units at $7.70 = $30.80.
    let broker = MockBroker::new().with_position("ETH", dec!(7.70), dec!(30.80));
    let mut tl = eth_loop(&broker);

    let report = tl.run_iteration().await;

    assert_eq!(report.sold, Some(dec!(0.80)));
    assert_eq!(report.bought, None);
    assert!((broker.holding_value("ETH") - dec!(30.00)).abs() < dec!(0.0001));
    assert_eq!(tl.profit().value(), dec!(-29.20));

    let orders = broker.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Sell);
}

#[tokio::test]
async fn test_dip_without_profit_buys_fallback() {
    // 4 units at $7 = $28, below the $28.50 dip line.
    let broker = MockBroker::new().with_position("ETH", dec!(7), dec!(28));
    let mut tl = eth_loop(&broker);

    let report = tl.run_iteration().await;

    assert_eq!(report.bought, Some(dec!(0.35)));
    assert_eq!(broker.holding_value("ETH"), dec!(28.35));
    assert_eq!(tl.profit().value(), dec!(-0.35));
}

#[tokio::test]
async fn test_dip_reinvests_profit_up_to_shortfall() {
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(28));
    let mut tl = eth_loop(&broker).with_profit(RunningProfit::from(dec!(5.00)));

    let report = tl.run_iteration().await;

    assert_eq!(report.bought, Some(dec!(2.00)));
    assert_eq!(broker.holding_value("ETH"), dec!(30));
    assert_eq!(tl.profit().value(), dec!(3.00));
}

#[tokio::test]
async fn test_outage_skips_checks_then_recovers() {
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(28));
    let mut tl = eth_loop(&broker).with_profit(RunningProfit::from(dec!(5.00)));

    broker.fail(Op::Holding, "503 Service Unavailable");
    let report = tl.run_iteration().await;
    assert_eq!(report.failed_checks, 2);
    assert!(broker.orders().is_empty());
    assert_eq!(tl.profit().value(), dec!(5.00));

    broker.recover(Op::Holding);
    let report = tl.run_iteration().await;
    assert_eq!(report.failed_checks, 0);
    assert_eq!(report.bought, Some(dec!(2.00)));
    assert_eq!(tl.profit().value(), dec!(3.00));
}

#[tokio::test]
async fn test_failed_buy_keeps_profit() {
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(28));
    broker.fail(Op::Buy, "order rejected");
    let mut tl = eth_loop(&broker).with_profit(RunningProfit::from(dec!(5.00)));

    let report = tl.run_iteration().await;
    assert_eq!(report.failed_checks, 1);
    assert_eq!(report.bought, None);
    assert_eq!(tl.profit().value(), dec!(5.00));
}

#[tokio::test]
async fn test_profit_carries_across_iterations() {
    // Iteration 1 sells at $10.30 (value $30.90); iteration 2 sees the
    // price fall to $9.00 and buys the fallback since profit is negative.
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(30));
    broker.script_prices("ETH", &[dec!(10.30), dec!(10.30), dec!(9.00), dec!(9.00)]);
    let mut tl = eth_loop(&broker);

    let first = tl.run_iteration().await;
    assert_eq!(first.sold, Some(dec!(0.90)));
    assert_eq!(tl.profit().value(), dec!(-29.10));

    let second = tl.run_iteration().await;
    assert_eq!(second.sold, None);
    assert_eq!(second.bought, Some(dec!(0.35)));
    assert_eq!(tl.profit().value(), dec!(-29.45));
}

#[tokio::test]
async fn test_run_until_shutdown_returns_profit() {
    let broker = MockBroker::new().with_position("ETH", dec!(10), dec!(30));
    broker.script_prices("ETH", &[dec!(10.30)]);
    let (tx, rx) = engine::shutdown_channel();

    let handle = tokio::spawn(eth_loop(&broker).run(rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let profit = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("trading loop did not stop")
        .unwrap();

    // Only the first iteration was above target; the rest sit at core.
    assert_eq!(broker.orders().len(), 1);
    assert_eq!(profit.value(), dec!(-29.10));
}

#[tokio::test]
async fn test_all_loops_run_independently_and_stop() {
    let broker = MockBroker::new()
        .with_position("BTC", dec!(60000), dec!(30))
        .with_position("ETH", dec!(3000), dec!(30))
        .with_position("AAPL", dec!(200), dec!(30));
    // AAPL dips below core; only its loop should trade.
    broker.set_price("AAPL", dec!(180));

    let config = AppConfig {
        trade_interval: TICK,
        report_interval: TICK,
        ..AppConfig::default()
    };
    let (tx, rx) = engine::shutdown_channel();
    let handles = engine::spawn_all(&config, Arc::new(broker.clone()), rx);
    assert_eq!(handles.len(), 6);
    assert_eq!(
        handles.iter().filter(|h| h.kind == LoopKind::PriceReporter).count(),
        3
    );

    // A quote outage must not end any loop.
    broker.fail(Op::Quote, "rate limited");
    tokio::time::sleep(Duration::from_millis(10)).await;
    broker.recover(Op::Quote);
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    let panicked = tokio::time::timeout(Duration::from_secs(2), engine::wait_all(handles))
        .await
        .expect("loops did not stop");
    assert_eq!(panicked, 0);

    let orders = broker.orders();
    assert!(!orders.is_empty());
    assert!(orders.iter().all(|o| o.symbol == "AAPL" && o.side == OrderSide::Buy));
    assert!(broker.quote_calls() > 0);
}
