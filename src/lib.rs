//! dsh ライブラリ — ベンチマーク・テスト用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `benches/bench_main.rs` 等の外部クレートから
//! パーサー・ビルトイン・executor 機能に直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | 構文解析（トークナイザ、コマンドビルダー、パイプライン分割、上限検証） |
//! | [`builtins`] | ビルトイン（`cd`, `exit` — fork なしでプロセス内実行） |
//! | [`executor`] | パイプライン実行（パイプ接続、リダイレクト適用、子プロセス回収） |
//! | [`shell`] | セッション状態（終了ステータス、exit フラグ、作業ディレクトリ） |
//! | [`spawn`] | `posix_spawnp` ラッパー（fd 操作の宣言的指定、起動失敗の区別） |

pub mod builtins;
pub mod executor;
pub mod parser;
pub mod shell;
pub mod spawn;
