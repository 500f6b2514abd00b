//! シェルのセッション状態を保持するモジュール。
//!
//! 隠れたグローバル変数を持たず、REPL ループが [`Shell`] を所有して
//! executor / builtins に可変参照で渡す。環境変数は `std::env` を直接使用し、
//! 子プロセスへの自動継承を活用する。

use std::path::PathBuf;

/// シェルの実行状態。REPL ループ全体で共有される。
pub struct Shell {
    /// 直前のコマンド（パイプラインなら最終段）の終了ステータス。
    pub last_status: i32,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
    /// 現在の作業ディレクトリ。`cd` 成功時に更新され、以降の相対パス
    /// （リダイレクト先を含む）に影響する。プロセス全体で共有される状態の
    /// 明示的なミラー。
    pub cwd: PathBuf,
}

impl Shell {
    pub fn new() -> Self {
        Self {
            last_status: 0,
            should_exit: false,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}
