//! コマンド実行: ビルトイン判定、リダイレクト適用、パイプライン接続、子プロセスの回収。
//!
//! - [`execute`]: パイプライン 1 本のエントリポイント
//! - 単一ビルトイン: fork なしのインラインパス（[`builtins::try_exec`]）
//! - それ以外: spawn パス（[`execute_job`]）
//!   - N-1 本のパイプを作成し、各段の stdin/stdout を接続
//!   - `<` / `>` のリダイレクトファイルはパイプ接続を上書き
//!   - 親は各段の spawn 直後に消費済みパイプ端を close（下流の EOF 保証）
//!   - 全子プロセスを `waitpid` で回収し、最終段のステータスを返す
//!
//! ## 失敗ポリシー
//!
//! - パイプ作成・リダイレクトファイルのオープン失敗（資源エラー）:
//!   残りの段の作成を中止し、開いた fd をすべて close、spawn 済みの子は回収する。
//! - 起動失敗（コマンド未発見等）: その段に局所的。診断を表示し、残りの段は
//!   通常どおり起動する（失敗段のパイプ端は親で close 済みのため下流は EOF を見る）。
//! - パイプライン全体の結果は常に最終段のステータス。最終段が起動に失敗した
//!   場合はその失敗コード（127/126/1）。

use std::fs::File;
use std::io;
use std::os::unix::io::IntoRawFd;

use crate::builtins;
use crate::parser::{Command, Pipeline, CMD_MAX};
use crate::shell::Shell;
use crate::spawn;

/// パイプライン 1 本を実行し、終了ステータスを返す。
///
/// ディスパッチ:
/// 1. 1 段でビルトイン → プロセス内で直接実行（fork なし）
/// 2. それ以外（外部コマンド、複数段） → [`execute_job`]
pub fn execute(shell: &mut Shell, pipeline: &Pipeline<'_>) -> i32 {
    if pipeline.commands.len() == 1 {
        let args = &pipeline.commands[0].args;
        if builtins::is_builtin(args[0]) {
            // try_exec は is_builtin が真なら必ず Some を返す
            return builtins::try_exec(shell, args).unwrap_or(1);
        }
    }

    execute_job(pipeline)
}

// ── リダイレクト fd ─────────────────────────────────────────────────

/// 1 段分のリダイレクト先 fd。`open_redirect_fds` が返す。
struct RedirectFds {
    stdin_fd: Option<i32>,
    stdout_fd: Option<i32>,
}

impl RedirectFds {
    /// 親側で保持している fd を close する。spawn の成否によらず呼ぶ。
    fn close(&self) {
        if let Some(fd) = self.stdin_fd {
            unsafe { libc::close(fd) };
        }
        if let Some(fd) = self.stdout_fd {
            unsafe { libc::close(fd) };
        }
    }
}

/// リダイレクト先ファイルを開き、raw fd を返す。
///
/// 入力は read-only（存在しなければ失敗）、出力は create/truncate で開く。
/// 開いた fd は呼び出し側（spawn 後の親プロセス）で close する責任がある。
fn open_redirect_fds(cmd: &Command<'_>) -> Result<RedirectFds, i32> {
    let mut fds = RedirectFds {
        stdin_fd: None,
        stdout_fd: None,
    };

    if let Some(target) = cmd.input_file {
        let f = File::open(target).map_err(|e| {
            eprintln!("dsh: {}: {}", target, e);
            1
        })?;
        fds.stdin_fd = Some(f.into_raw_fd());
    }
    if let Some(target) = cmd.output_file {
        let f = File::create(target).map_err(|e| {
            eprintln!("dsh: {}: {}", target, e);
            // 入力側を先に開いていた場合は道連れに close する
            fds.close();
            1
        })?;
        fds.stdout_fd = Some(f.into_raw_fd());
    }

    Ok(fds)
}

// ── spawn パス ──────────────────────────────────────────────────────

/// 各段の終了結果。spawn に失敗した段は wait せず失敗コードを確定させる。
enum StageResult {
    Spawned(libc::pid_t),
    FailedToLaunch(i32),
    NotCreated,
}

/// `waitpid` の raw status を終了コードに変換する。
/// シグナル終了は bash 互換の 128 + シグナル番号。
fn decode_wait_status(raw: i32) -> i32 {
    if libc::WIFEXITED(raw) {
        libc::WEXITSTATUS(raw)
    } else if libc::WIFSIGNALED(raw) {
        128 + libc::WTERMSIG(raw)
    } else {
        1
    }
}

/// パイプライン（単一 or 複数段）を子プロセスとして実行する。
///
/// 処理の流れ:
/// 1. N-1 本のパイプを作成（段数は parse 時に [`CMD_MAX`] 以下が保証されるため
///    固定長スタック配列で足りる）
/// 2. 各段を `spawn::spawn` で起動。子側ではパイプ端の dup2 と不要 fd の close が
///    イメージロード前に行われる
/// 3. 親側は各段の起動直後に消費済みパイプ端とリダイレクト fd を close する。
///    隣接する両方の子が必要な端を継承し終えた時点で親が close しないと、
///    下流の読み手が EOF を観測できない
/// 4. 全子プロセスを回収し、最終段のステータスを返す
fn execute_job(pipeline: &Pipeline<'_>) -> i32 {
    let n = pipeline.commands.len();
    debug_assert!(n >= 1 && n <= CMD_MAX);

    // ── パイプ作成（-1 = 未作成/クローズ済み）──
    let mut pipes: [[i32; 2]; CMD_MAX - 1] = [[-1; 2]; CMD_MAX - 1];
    let pipe_count = n - 1;

    for i in 0..pipe_count {
        if unsafe { libc::pipe(pipes[i].as_mut_ptr()) } != 0 {
            eprintln!("dsh: pipe: {}", io::Error::last_os_error());
            // 既に作成済みのパイプを close
            close_all_pipes(&mut pipes);
            return 1;
        }
    }

    let mut results: [StageResult; CMD_MAX] = std::array::from_fn(|_| StageResult::NotCreated);
    let mut resource_error: Option<i32> = None;

    for i in 0..n {
        let cmd = &pipeline.commands[i];

        // stdin/stdout の決定（パイプ接続）
        let mut stdin_fd = if i > 0 { Some(pipes[i - 1][0]) } else { None };
        let mut stdout_fd = if i < n - 1 { Some(pipes[i][1]) } else { None };

        // リダイレクトの fd を開く。失敗は資源エラー: 残りの段は作らない。
        let redir_fds = match open_redirect_fds(cmd) {
            Ok(fds) => fds,
            Err(status) => {
                resource_error = Some(status);
                break;
            }
        };

        // リダイレクトの fd でパイプの fd を上書き
        if redir_fds.stdin_fd.is_some() {
            stdin_fd = redir_fds.stdin_fd;
        }
        if redir_fds.stdout_fd.is_some() {
            stdout_fd = redir_fds.stdout_fd;
        }

        // 子プロセスで close すべき fd（開いている全パイプ端のうち dup 対象以外）
        let mut close_fds: Vec<i32> = Vec::new();
        for p in pipes.iter().take(pipe_count) {
            for &fd in p {
                if fd >= 0 && stdin_fd != Some(fd) && stdout_fd != Some(fd) {
                    close_fds.push(fd);
                }
            }
        }

        match spawn::spawn(&cmd.args, stdin_fd, stdout_fd, &close_fds) {
            Ok(pid) => results[i] = StageResult::Spawned(pid),
            Err(e) => {
                // 起動失敗はこの段に局所的。パイプ端は下で close され、
                // 下流は EOF を見る。
                eprintln!("{}", e);
                results[i] = StageResult::FailedToLaunch(e.exit_status());
            }
        }

        // 消費したパイプ端を親側で close（spawn の成否によらず）
        if i > 0 && pipes[i - 1][0] >= 0 {
            unsafe { libc::close(pipes[i - 1][0]) };
            pipes[i - 1][0] = -1;
        }
        if i < n - 1 && pipes[i][1] >= 0 {
            unsafe { libc::close(pipes[i][1]) };
            pipes[i][1] = -1;
        }

        // リダイレクト用に開いた fd を親側で close
        redir_fds.close();
    }

    // 未消費のパイプ端を close（資源エラーで中断した場合の残り）
    close_all_pipes(&mut pipes);

    // ── 全子プロセスを回収 ──
    // 回収順は spawn 順でよい（順序保証は不要、全員回収のみが要件）。
    let mut last_status = 0;
    for result in results.iter().take(n) {
        match result {
            StageResult::Spawned(pid) => {
                let mut raw: i32 = 0;
                if unsafe { libc::waitpid(*pid, &mut raw, 0) } == *pid {
                    last_status = decode_wait_status(raw);
                }
            }
            StageResult::FailedToLaunch(status) => last_status = *status,
            StageResult::NotCreated => {}
        }
    }

    // 資源エラーで中断した場合、spawn 済みの段のステータスでは上書きせず
    // 失敗ステータスをそのまま返す（最終段は作られていない）。
    resource_error.unwrap_or(last_status)
}

/// 配列中の有効なパイプ fd をすべて close し、-1 で埋める。
fn close_all_pipes(pipes: &mut [[i32; 2]; CMD_MAX - 1]) {
    for p in pipes.iter_mut() {
        for fd in p.iter_mut() {
            if *fd >= 0 {
                unsafe { libc::close(*fd) };
                *fd = -1;
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
