//! ビルトインコマンドの実装。
//!
//! ビルトインは fork/exec を経由せずプロセス内で直接実行される。
//! 対象はパイプライン 1 段のコマンドのみ（ビルトインはパイプに参加しない）。
//! `try_exec()` が `Some(status)` を返せばビルトインとして処理済み、
//! `None` なら外部コマンドとして executor に委ねる。

use std::env;
use std::path::Path;

use crate::shell::Shell;

/// コマンド名がビルトインかどうかを判定する。
pub fn is_builtin(name: &str) -> bool {
    matches!(name, "exit" | "cd")
}

/// ビルトインコマンドの実行を試みる。
///
/// 戻り値:
/// - `Some(status)` — ビルトインとして実行済み
/// - `None` — 該当するビルトインなし（外部コマンドとして実行すべき）
pub fn try_exec(shell: &mut Shell, args: &[&str]) -> Option<i32> {
    match args[0] {
        "exit" => Some(builtin_exit(shell, args)),
        "cd" => Some(builtin_cd(shell, args)),
        _ => None,
    }
}

/// `exit [N]` — シェルを終了する。N が指定されればそのコードで、省略時は直前のステータスで終了。
fn builtin_exit(shell: &mut Shell, args: &[&str]) -> i32 {
    shell.should_exit = true;
    if args.len() > 1 {
        args[1].parse::<i32>().unwrap_or_else(|_| {
            eprintln!("dsh: exit: {}: numeric argument required", args[1]);
            2
        })
    } else {
        shell.last_status
    }
}

/// `cd [dir]` — カレントディレクトリを変更する。
///
/// 引数なしは no-op 成功。2 個目以降の引数は無視する。
/// 失敗（存在しないパス、権限なし）は報告するがセッションは継続する。
fn builtin_cd(shell: &mut Shell, args: &[&str]) -> i32 {
    if args.len() == 1 {
        return 0;
    }

    let target = args[1];
    if let Err(e) = env::set_current_dir(Path::new(target)) {
        eprintln!("dsh: cd: {}: {}", target, e);
        return 1;
    }
    // プロセス全体の cwd 変更をセッション状態に反映する
    shell.cwd = env::current_dir().unwrap_or_else(|_| target.into());
    0
}

// ── Tests ───────────────────────────────────────────────────────────
