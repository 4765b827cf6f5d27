mod demo_host;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use strand_core::ScriptApi;
use strand_core::config::StrandConfig;
use strand_core::domain::{CallbackRef, EntityId, HostValue};
use strand_core::impls::SqliteConnector;
use strand_core::observability::TaskCounts;
use tokio::time::{Duration, interval};

use demo_host::{DemoFrame, DemoHost, PendingCall};

const ON_LEADERBOARD: CallbackRef = CallbackRef::new(1);
const ON_PLAYER_COUNT: CallbackRef = CallbackRef::new(2);

const TICK: Duration = Duration::from_millis(50);
const MAX_TICKS: u32 = 200;

#[derive(Debug, Default, Serialize)]
struct Summary {
    ticks: u32,
    delivered: usize,
    dropped: usize,
    remaining: TaskCounts,
}

fn config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn s(v: &str) -> HostValue {
    HostValue::String(v.to_string())
}

/// Run one builtin and return what it pushed.
fn call(f: impl FnOnce(&mut DemoFrame), params: Vec<HostValue>) -> HostValue {
    let mut frame = DemoFrame::new(params);
    f(&mut frame);
    frame.into_result()
}

/// Script side of a delivered query: read every row, then free the task.
fn run_callback(api: &ScriptApi, pending: &PendingCall) {
    let Some(id) = pending.args.first().cloned() else {
        return;
    };

    let rows = call(|f| api.num_rows(f), vec![id.clone()]);
    tracing::info!(
        callback = %pending.callback,
        target = ?pending.target,
        ?id,
        ?rows,
        argument = ?pending.args.get(1),
        "callback running"
    );

    loop {
        match call(|f| api.fetch_row(f), vec![id.clone()]) {
            HostValue::Array(columns) => tracing::info!(?columns, "row"),
            _ => break,
        }
    }

    // 結果を読み終えたら明示的に解放する
    call(|f| api.free_task(f), vec![id]);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path() {
        Some(path) if path.exists() => StrandConfig::load(&path)?,
        _ => StrandConfig::default(),
    };
    logging::init_logging(&config.logging);

    let mut api = ScriptApi::new(Arc::new(SqliteConnector::new()), config.worker);
    let mut host = DemoHost::new();

    let db = &config.database;
    let handle = call(
        |f| api.initialize(f),
        vec![
            s(&db.host),
            s(&db.user),
            s(&db.password),
            s(&db.database),
            HostValue::Int(i32::from(db.port)),
        ],
    );
    if handle.is_undefined() {
        return Err("failed to initialize async connection".into());
    }

    // round 1: this result arrives after the round ends and is dropped
    call(
        |f| api.create_query(&host, f),
        vec![s("SELECT 'from the previous round'"), HostValue::Function(ON_LEADERBOARD)],
    );
    host.next_round();

    for sql in [
        "CREATE TABLE IF NOT EXISTS scores (name TEXT, score INTEGER)",
        "DELETE FROM scores",
        "INSERT INTO scores VALUES ('ann', 31), ('bob', 17), ('cid', NULL)",
    ] {
        call(|f| api.create_query_nosave(&host, f), vec![s(sql)]);
    }

    call(
        |f| api.create_query(&host, f),
        vec![
            s("SELECT name, score FROM scores ORDER BY score DESC"),
            HostValue::Function(ON_LEADERBOARD),
            s("leaderboard"),
        ],
    );

    let player = EntityId::new(0);
    host.spawn(player);
    call(
        |f| api.create_entity_query(&host, player, f),
        vec![
            s("SELECT COUNT(*) AS players FROM scores"),
            HostValue::Function(ON_PLAYER_COUNT),
            HostValue::Vector([0.0, 0.0, 64.0]),
        ],
    );

    // the bot's slot is reused before its result comes back
    let bot = EntityId::new(1);
    host.spawn(bot);
    call(
        |f| api.create_entity_query(&host, bot, f),
        vec![s("SELECT 1"), HostValue::Function(ON_PLAYER_COUNT)],
    );
    host.spawn(bot);

    let mut summary = Summary::default();
    let mut ticker = interval(TICK);
    while summary.ticks < MAX_TICKS {
        ticker.tick().await;
        summary.ticks += 1;

        let report = api.check_done(&mut host);
        summary.delivered += report.delivered.len();
        summary.dropped += report.dropped.len();

        for pending in host.take_pending() {
            run_callback(&api, &pending);
        }

        let counts = api.context().map(|c| c.counts()).unwrap_or_default();
        if counts.total() == 0 {
            break;
        }
    }

    summary.remaining = api.context().map(|c| c.counts()).unwrap_or_default();
    tracing::info!(live_threads = host.live_threads(), "tick loop finished");
    call(|f| api.close(f), vec![]);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
