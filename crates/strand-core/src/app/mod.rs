//! App - アプリケーション層
//!
//! ports と store を組み合わせて非同期クエリのライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **QueryContext**: 接続・タスクストア・ワーカーの所有者
//! - **WorkerLoop / Worker**: バックグラウンドでのクエリ実行と物理削除
//! - **Dispatcher**: ホストのティックで結果をコールバックへ配送
//! - **ScriptApi**: ホストスクリプト向けビルトイン
//! - **SharedStatus**: 直近のステートメントの errno/error/affected_rows

pub mod context;
pub mod dispatcher;
pub mod script_api;
pub mod status;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::context::QueryContext;
pub use self::dispatcher::{DispatchReport, Dispatcher, DropReason};
pub use self::script_api::ScriptApi;
pub use self::status::{ConnectionStatus, SharedStatus};
pub use self::worker_loop::{PassReport, Worker, WorkerLoop};
