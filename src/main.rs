//! dsh — パイプライン実行エンジンを駆動する対話ループ
//!
//! REPL ループ: プロンプト表示 → 1 行読み取り → パース → 実行 → ループ
//!
//! エンジン本体（パース・ビルトイン・プロセス起動）はライブラリ側にあり、
//! このループは生の入力行を渡して結果を表示するだけの薄い皮。
//! 行編集・履歴・ジョブ制御は持たない。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | 構文解析（トークナイザ、コマンドビルダー、パイプライン分割、上限検証) |
//! | [`builtins`] | ビルトイン（`cd`, `exit` — fork なしでプロセス内実行） |
//! | [`executor`] | パイプライン実行（パイプ接続、リダイレクト適用、子プロセス回収） |
//! | [`shell`] | セッション状態（終了ステータス、exit フラグ、作業ディレクトリ） |
//! | [`spawn`] | `posix_spawnp` ラッパー（fd 操作の宣言的指定、起動失敗の区別） |

mod builtins;
mod executor;
mod parser;
mod shell;
mod spawn;

use std::io::{self, BufRead, Write};

use shell::Shell;

const PROMPT: &str = "dsh> ";

fn main() {
    let mut shell = Shell::new();
    let stdin = io::stdin();
    let mut stdin_locked = stdin.lock();
    let mut line = String::new();

    loop {
        print!("{}", PROMPT);
        let _ = io::stdout().flush();

        line.clear();
        match stdin_locked.read_line(&mut line) {
            // EOF: 改行を出力して正常終了
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("dsh: read: {}", e);
                break;
            }
        }

        // 末尾の改行を除去
        let raw = line.trim_end_matches('\n');

        match parser::parse(raw) {
            Ok(Some(pipeline)) => {
                shell.last_status = executor::execute(&mut shell, &pipeline);
            }
            Ok(None) => {
                println!("warning: no commands provided");
            }
            Err(e) => {
                // パース失敗: プロセスは一切起動されずセッションは継続する
                eprintln!("dsh: {}", e);
                shell.last_status = 2;
            }
        }

        if shell.should_exit {
            break;
        }
    }

    std::process::exit(shell.last_status);
}
