//! End-to-end tests for the risk-gated paper trading loop.
//!
//! Builds the engine from a TOML file in a temp directory, submits orders
//! through the interceptor chain, and drives the engine event router by hand
//! so every assertion sees a settled OMS and gate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;

use rg_core::config::{AppConfig, PaperConfig, PaperContract, RecorderConfig, RiskConfig};
use rg_core::types::*;
use rg_execution::{InterceptorChain, SubmitOutcome};
use rg_oms::Oms;
use rg_recorder::Recorder;
use rg_risk::RiskGate;
use rg_trading::engine::TradingEngine;
use rg_trading::event_loop::{EngineEvent, EventRouter};
use rg_trading::paper_gateway::PaperGateway;

fn rb() -> Instrument {
    Instrument::new("rb2405", Exchange::Shfe)
}

fn make_limit(direction: Direction, price: i64, volume: Volume) -> OrderRequest {
    OrderRequest::limit(&rb(), direction, Offset::Open, Price::new(price, 0), volume)
}

fn make_tick(bid: i64, ask: i64) -> TickData {
    TickData {
        instrument: rb(),
        last_price: Price::new(bid, 0),
        bid_price: Price::new(bid, 0),
        ask_price: Price::new(ask, 0),
        timestamp: Timestamp::now(),
    }
}

fn reason(outcome: SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Rejected { reason } => reason,
        SubmitOutcome::Accepted(id) => panic!("expected rejection, got accepted {id}"),
    }
}

/// Write `riskgate.toml` into `dir` with the risk section given and the
/// settings file kept inside `dir`.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("riskgate.toml");
    let settings = dir.join("risk_manager_setting.json");
    let content = format!(
        r#"
[settings]
path = "{}"

[paper]
balance = 500000.0
contracts = [{{ instrument = "rb2405.SHFE", size = 10.0, pricetick = 1.0 }}]

{extra}
"#,
        settings.display()
    );
    std::fs::write(&path, content).unwrap();
    path
}

fn make_engine(dir: &Path, extra: &str) -> (TradingEngine, EventRouter) {
    let config = AppConfig::load(Some(write_config(dir, extra))).unwrap();
    let engine = TradingEngine::new(config).unwrap();
    let router = engine.router();
    engine.gateway().connect();
    router.drain(engine.events());
    (engine, router)
}

#[test]
fn test_flow_limit_resets_on_timer() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, router) = make_engine(
        dir.path(),
        r#"
[risk]
active = true
order_flow_limit = 2
order_flow_clear = 1
"#,
    );

    assert!(engine.send_order(&make_limit(Direction::Long, 3800, 50)).is_accepted());
    assert!(engine.send_order(&make_limit(Direction::Long, 3801, 50)).is_accepted());
    let third = reason(engine.send_order(&make_limit(Direction::Long, 3802, 50)));
    assert!(third.starts_with("flow limit"), "{third}");

    router.handle(EngineEvent::Timer(Timestamp::now()));
    assert!(engine.send_order(&make_limit(Direction::Long, 3803, 50)).is_accepted());

    router.drain(engine.events());
    assert_eq!(engine.gateway().resting_count(), 3);
}

#[test]
fn test_self_trade_blocked_until_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, router) = make_engine(dir.path(), "[risk]\nactive = true\n");

    let ask = engine.send_order(&make_limit(Direction::Short, 3860, 1));
    let ask_id = ask.order_id().cloned().unwrap();
    router.drain(engine.events());

    let crossing = reason(engine.send_order(&make_limit(Direction::Long, 3860, 1)));
    assert!(crossing.starts_with("crosses own ask"), "{crossing}");
    assert!(engine.send_order(&make_limit(Direction::Long, 3859, 1)).is_accepted());

    engine.cancel_order(&ask_id).unwrap();
    router.drain(engine.events());
    assert!(engine.send_order(&make_limit(Direction::Long, 3860, 1)).is_accepted());
    assert_eq!(engine.gate().counters().cancel_count(&rb()), 1);
}

#[test]
fn test_fills_count_toward_trade_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, router) = make_engine(
        dir.path(),
        "[risk]\nactive = true\ntrade_limit = 5\n",
    );

    engine.gateway().on_tick(make_tick(3850, 3851));
    assert!(engine.send_order(&make_limit(Direction::Long, 3851, 5)).is_accepted());
    router.drain(engine.events());

    assert_eq!(engine.gate().counters().trade_count(), 5);
    let next = reason(engine.send_order(&make_limit(Direction::Long, 3840, 1)));
    assert!(next.starts_with("daily trade limit"), "{next}");
}

#[test]
fn test_disabled_gate_passes_invalid_volume() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _router) = make_engine(dir.path(), "");

    assert!(!engine.gate().get_config().active);
    assert!(engine.send_order(&make_limit(Direction::Long, 3800, 0)).is_accepted());
    assert_eq!(engine.gate().counters().flow_count(), 0);
}

#[test]
fn test_order_value_limit_uses_paper_account() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _router) = make_engine(
        dir.path(),
        r#"
[risk]
active = true

[plugins]
enabled = ["order_value_limit"]
"#,
    );

    // Equity 500 000 halves the 8 000 baseline cap to 4 000.
    assert!(engine.send_order(&make_limit(Direction::Long, 50, 1)).is_accepted());
    let big = reason(engine.send_order(&make_limit(Direction::Long, 500, 1)));
    assert!(big.starts_with("order value limit"), "{big}");

    let au = OrderRequest::limit(
        &Instrument::new("au2406", Exchange::Shfe),
        Direction::Long,
        Offset::Open,
        Price::new(480, 0),
        1,
    );
    let unknown = reason(engine.send_order(&au));
    assert!(unknown.starts_with("contract unavailable"), "{unknown}");
}

#[test]
fn test_symbol_restriction_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("white_list.json");
    std::fs::write(&list, r#"{"white_list": ["rb2405"]}"#).unwrap();
    let (engine, _router) = make_engine(
        dir.path(),
        &format!(
            r#"
[risk]
active = true

[plugins]
enabled = ["symbol_restriction"]

[plugins.symbol_restriction]
mode = "allow"
path = "{}"
"#,
            list.display()
        ),
    );

    assert!(engine.send_order(&make_limit(Direction::Long, 3800, 1)).is_accepted());
    let hc = OrderRequest::limit(
        &Instrument::new("hc2405", Exchange::Shfe),
        Direction::Long,
        Offset::Open,
        Price::new(3600, 0),
        1,
    );
    assert!(reason(engine.send_order(&hc)).starts_with("symbol restricted"));
}

#[test]
fn test_missing_restriction_file_blocks_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        &format!(
            r#"
[plugins]
enabled = ["symbol_restriction"]

[plugins.symbol_restriction]
path = "{}"
"#,
            dir.path().join("absent.json").display()
        ),
    );
    let config = AppConfig::load(Some(path)).unwrap();
    let err = TradingEngine::new(config).err().unwrap();
    assert!(format!("{err:#}").contains("symbol_restriction"));
}

#[test]
fn test_open_allowance_drawn_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let symbols = dir.path().join("symbol_max_open.json");
    let contracts = dir.path().join("contract_max_open.json");
    std::fs::write(&symbols, r#"{"RB": 3}"#).unwrap();
    std::fs::write(&contracts, "{}").unwrap();
    let (engine, router) = make_engine(
        dir.path(),
        &format!(
            r#"
[risk]
active = true

[plugins]
enabled = ["intraday_max_open"]

[plugins.intraday_max_open]
symbol_path = "{}"
contract_path = "{}"
"#,
            symbols.display(),
            contracts.display()
        ),
    );

    engine.gateway().on_tick(make_tick(3850, 3851));
    assert!(engine.send_order(&make_limit(Direction::Long, 3851, 3)).is_accepted());
    router.drain(engine.events());

    let blocked = reason(engine.send_order(&make_limit(Direction::Long, 3840, 1)));
    assert!(blocked.starts_with("open limit"), "{blocked}");

    let mut close = make_limit(Direction::Short, 3860, 1);
    close.offset = Offset::Close;
    assert!(engine.send_order(&close).is_accepted());

    engine.gate().close().unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&symbols).unwrap()).unwrap();
    assert_eq!(saved["RB"], 0);
}

#[tokio::test]
async fn test_rejections_reach_questdb() {
    use tokio::io::AsyncReadExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        socket.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    });

    let (mut recorder, handle) = Recorder::new(RecorderConfig {
        enabled: true,
        questdb_ilp_addr: addr,
        batch_size: 100,
        flush_interval_ms: 10_000,
        channel_capacity: 64,
    });
    let recorder_task = tokio::spawn(async move {
        recorder.run().await.unwrap();
        recorder.metrics().records_flushed
    });

    let oms = Arc::new(Oms::new());
    let gate = Arc::new(
        RiskGate::builder(oms.clone())
            .config(RiskConfig {
                active: true,
                ..RiskConfig::default()
            })
            .sink(Arc::new(handle))
            .build()
            .unwrap(),
    );
    let (tx, rx) = channel::unbounded();
    let paper = PaperConfig {
        contracts: vec![PaperContract {
            instrument: "rb2405.SHFE".to_string(),
            size: 10.0,
            pricetick: 1.0,
        }],
        ..PaperConfig::default()
    };
    let gateway = Arc::new(PaperGateway::new("PAPER", &paper, tx).unwrap());
    let mut chain = InterceptorChain::new(gateway.clone());
    chain.add_interceptor(gate.clone());
    let router = EventRouter::new(oms, gate.clone());

    // Refused by the gate.
    assert!(!chain.submit(&make_limit(Direction::Long, 3850, 0), "PAPER").is_accepted());
    // Accepted by the gate, refused by the venue for an off-grid price.
    let off_grid_price = Price::new(38505, 1);
    let off_grid = OrderRequest::limit(&rb(), Direction::Long, Offset::Open, off_grid_price, 1);
    assert!(chain.submit(&off_grid, "PAPER").is_accepted());
    router.drain(&rx);

    drop(router);
    drop(chain);
    drop(gate);
    let flushed = tokio::time::timeout(Duration::from_secs(10), recorder_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flushed, 2);

    let received = server.await.unwrap();
    let lines: Vec<&str> = received.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("order_error,symbol=rb2405,exchange=SHFE,error_code=RISK "));
    assert!(lines[0].contains("message=\"invalid volume"));
    assert!(lines[1].contains("error_code=PRICE_TICK "));
    assert!(lines[1].contains("order_id=\"PAPER.1\""));
}

#[tokio::test]
async fn test_engine_run_saves_settings_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(Some(write_config(
        dir.path(),
        "[risk]\nactive = true\norder_size_limit = 7\n",
    )))
    .unwrap();
    let engine = TradingEngine::new(config).unwrap();
    let cancel = engine.cancel_token();

    let run = tokio::spawn(engine.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let saved = rg_risk::SettingsStore::new(dir.path().join("risk_manager_setting.json"))
        .load()
        .unwrap()
        .unwrap();
    assert!(saved.active);
    assert_eq!(saved.order_size_limit, 7);
}
