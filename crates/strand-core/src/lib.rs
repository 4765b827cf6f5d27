//! strand-core
//!
//! Async query bridge: a single-threaded host queues queries, one background
//! worker executes them serially on one connection, and a dispatcher hands
//! results back to host callbacks on the host's own tick.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, value, errors）
//! - **ports**: 抽象化レイヤー（Connector/Connection/ResultSet, HostRuntime/CallFrame, IdGenerator）
//! - **store**: タスクストア（arena, record, state）
//! - **app**: アプリケーションロジック（context, worker_loop, dispatcher, script_api, status）
//! - **impls**: 実装（SqliteConnector, MaterializedResult）
//! - **config**: TOML 設定
//! - **observability**: ステータスビュー

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{QueryContext, ScriptApi};
pub use config::StrandConfig;
pub use domain::StrandError;
