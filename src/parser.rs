//! トークナイザ + パーサー: 入力 1 行から [`Pipeline`] を構築する。
//!
//! 手書きトークナイザでゼロコピー（`&str` 借用）のトークン列を生成し、
//! セグメント単位のビルダーで [`Command`] 列に変換する。
//!
//! ## 対応構文
//!
//! - パイプライン: `cmd1 | cmd2 | cmd3`（最大 [`CMD_MAX`] 段）
//! - リダイレクト: `<`（stdin をファイルから読み取り）, `>`（stdout を上書き）
//! - クォート: ダブル (`"..."`) — 内部の空白を verbatim 保持
//!
//! パイプ分割はクォートを考慮しない（`|` が常にセグメント境界になる）。
//! 各上限は parse 時に検証され、超過は黙殺ではなく個別の [`ParseError`] になる。

use std::fmt;

// ── 上限定数 ────────────────────────────────────────────────────────

/// パイプラインの最大段数。超過は [`ParseError::TooManyCommands`]。
pub const CMD_MAX: usize = 8;
/// 1 コマンドの argv 最大要素数（argv\[0\] = コマンド名を含む）。
pub const CMD_ARGV_MAX: usize = 64;
/// コマンド名の最大バイト長。
pub const EXE_MAX: usize = 64;
/// 引数トークン 1 個の最大バイト長。
pub const ARG_MAX: usize = 256;
/// 入力行の最大バイト長。
pub const SH_CMD_MAX: usize = EXE_MAX + ARG_MAX;

// ── AST ─────────────────────────────────────────────────────────────

/// パイプラインの 1 段。argv とリダイレクト先を持つ。
///
/// 入力行からの借用（`&'a str`）で構築される。入力行は 1 行の実行が終わるまで
/// 呼び出し側が保持し、次の行を読む前に破棄される。
#[derive(Debug, PartialEq)]
pub struct Command<'a> {
    /// argv。`args[0]` がコマンド名。空にはならない。
    pub args: Vec<&'a str>,
    /// `<` で指定された stdin リダイレクト先。
    pub input_file: Option<&'a str>,
    /// `>` で指定された stdout リダイレクト先。
    pub output_file: Option<&'a str>,
}

/// パイプラインで接続されたコマンド列。`cmd1 | cmd2 | cmd3` → 3 要素。
///
/// 挿入順 = 実行順 = 入力の左から右。段数は 1 以上 [`CMD_MAX`] 以下。
#[derive(Debug, PartialEq)]
pub struct Pipeline<'a> {
    pub commands: Vec<Command<'a>>,
}

// ── Error ───────────────────────────────────────────────────────────

/// パース時に発生しうるエラー。いずれもプロセス起動前に報告され、
/// 部分実行は発生しない。
#[derive(Debug, PartialEq)]
pub enum ParseError {
    /// ダブルクォートが閉じられていない。
    UnterminatedQuote,
    /// リダイレクト演算子の後にターゲットファイル名がない。
    MissingRedirectTarget,
    /// セグメントがリダイレクトのみで、コマンド名がない。
    MissingCommand,
    /// パイプラインの段数が [`CMD_MAX`] を超えた。
    TooManyCommands,
    /// 1 コマンドの引数が [`CMD_ARGV_MAX`] を超えた。
    TooManyArguments,
    /// コマンド名が [`EXE_MAX`]、または引数が [`ARG_MAX`] を超えた。
    CommandTooLong,
    /// 入力行が [`SH_CMD_MAX`] を超えた。
    LineTooLong,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedQuote => write!(f, "error: unmatched quote"),
            Self::MissingRedirectTarget => write!(f, "error: missing redirection target"),
            Self::MissingCommand => write!(f, "error: redirection without a command"),
            Self::TooManyCommands => {
                write!(f, "error: piping limited to {} commands", CMD_MAX)
            }
            Self::TooManyArguments => {
                write!(f, "error: commands limited to {} arguments", CMD_ARGV_MAX)
            }
            Self::CommandTooLong => write!(f, "error: command or arguments too big"),
            Self::LineTooLong => {
                write!(f, "error: input limited to {} characters", SH_CMD_MAX)
            }
        }
    }
}

// ── Tokenizer (crate-private) ───────────────────────────────────────

/// トークナイザが生成する内部トークン型。
enum Token<'a> {
    Word(&'a str),
    RedirectIn,  // <
    RedirectOut, // >
}

/// 1 セグメント(パイプ区切り後の文字列)をトークン列に変換するイテレータ。
///
/// 空白をスキップし、クォート・リダイレクト記号・通常ワードを識別する。
/// 連続する空白は 1 つの境界に潰れ、空トークンは生成されない。
/// `Iterator<Item = Result<Token, ParseError>>` を実装。
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let ch = self.peek()?;

        // ダブルクォート: 区切り文字は消費し、内部は空白を含め verbatim 保持
        if ch == b'"' {
            self.pos += 1; // skip opening quote
            let start = self.pos;
            loop {
                if self.pos >= self.input.len() {
                    return Some(Err(ParseError::UnterminatedQuote));
                }
                if self.input.as_bytes()[self.pos] == b'"' {
                    let word = &self.input[start..self.pos];
                    self.pos += 1; // skip closing quote
                    return Some(Ok(Token::Word(word)));
                }
                self.pos += 1;
            }
        }

        // 通常ワード: 空白まで読む
        let start = self.pos;
        while self.pos < self.input.len()
            && !self.input.as_bytes()[self.pos].is_ascii_whitespace()
        {
            self.pos += 1;
        }
        let word = &self.input[start..self.pos];

        // `<` / `>` は単独トークンのときのみリダイレクト記号。
        // 前後に文字が密着しているもの（`>out` 等）は通常ワード扱い。
        match word {
            "<" => Some(Ok(Token::RedirectIn)),
            ">" => Some(Ok(Token::RedirectOut)),
            _ => Some(Ok(Token::Word(word))),
        }
    }
}

// ── Command Builder ─────────────────────────────────────────────────

/// 1 セグメントをトークナイズして [`Command`] を構築する。
///
/// - 最初の非リダイレクトトークンがコマンド名（= `args[0]`）
/// - `<` / `>` の直後のトークンをリダイレクト先として消費（argv には入れない）
/// - セグメントがトークンを生まなければ `Ok(None)`（呼び出し側がセグメントを捨てる）
fn build_command(segment: &str) -> Result<Option<Command<'_>>, ParseError> {
    let mut tokens = Tokenizer::new(segment);
    let mut args: Vec<&str> = Vec::new();
    let mut input_file: Option<&str> = None;
    let mut output_file: Option<&str> = None;

    while let Some(result) = tokens.next() {
        match result? {
            Token::Word(w) => {
                if args.is_empty() {
                    if w.len() > EXE_MAX {
                        return Err(ParseError::CommandTooLong);
                    }
                } else if w.len() > ARG_MAX {
                    return Err(ParseError::CommandTooLong);
                }
                if args.len() >= CMD_ARGV_MAX {
                    return Err(ParseError::TooManyArguments);
                }
                args.push(w);
            }
            token @ (Token::RedirectIn | Token::RedirectOut) => {
                // 直後のトークンがターゲット。リダイレクト記号の連続や
                // セグメント終端は MissingRedirectTarget。
                let target = match tokens.next() {
                    Some(Ok(Token::Word(w))) => w,
                    Some(Err(e)) => return Err(e),
                    _ => return Err(ParseError::MissingRedirectTarget),
                };
                // ターゲットも通常引数と同じ長さ上限に従う
                if target.len() > ARG_MAX {
                    return Err(ParseError::CommandTooLong);
                }
                // 同種のリダイレクトが複数あれば最後の指定が有効
                match token {
                    Token::RedirectIn => input_file = Some(target),
                    Token::RedirectOut => output_file = Some(target),
                    Token::Word(_) => unreachable!(),
                }
            }
        }
    }

    if args.is_empty() {
        // リダイレクトのみ（ターゲットはあるがコマンドがない）は専用エラー
        if input_file.is_some() || output_file.is_some() {
            return Err(ParseError::MissingCommand);
        }
        return Ok(None);
    }

    Ok(Some(Command { args, input_file, output_file }))
}

// ── Pipeline Builder ────────────────────────────────────────────────

/// 入力行をパースして [`Pipeline`] を返す。
///
/// - 空行・空白のみ・セグメントが全て空 → `Ok(None)`（呼び出し側が警告を表示）
/// - 正常なコマンド → `Ok(Some(Pipeline))`
/// - 構文エラー・上限超過 → `Err(ParseError)`
///
/// パイプ分割の生カウント（trim 前）が [`CMD_MAX`] を超えた時点で
/// コマンドを 1 つも構築せずに失敗する（部分確保の回避）。
pub fn parse(line: &str) -> Result<Option<Pipeline<'_>>, ParseError> {
    if line.len() > SH_CMD_MAX {
        return Err(ParseError::LineTooLong);
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // 生分割のカウントを先に検証する
    if trimmed.split('|').count() > CMD_MAX {
        return Err(ParseError::TooManyCommands);
    }

    let mut commands: Vec<Command<'_>> = Vec::new();
    for segment in trimmed.split('|') {
        // 空セグメント（`a || b` の間など）はエラーにせず捨てる
        match build_command(segment)? {
            Some(cmd) => commands.push(cmd),
            None => continue,
        }
    }

    if commands.is_empty() {
        return Ok(None);
    }

    Ok(Some(Pipeline { commands }))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// パース結果から各コマンドの argv を文字列ベクタとして取り出す。
    fn parse_args(input: &str) -> Vec<Vec<String>> {
        let pipeline = parse(input).unwrap().unwrap();
        pipeline
            .commands
            .iter()
            .map(|cmd| cmd.args.iter().map(|a| a.to_string()).collect())
            .collect()
    }

    // ── 単純コマンド ──

    #[test]
    fn simple_command() {
        assert_eq!(
            parse_args("echo hello world"),
            vec![vec!["echo", "hello", "world"]],
        );
    }

    #[test]
    fn single_arg() {
        assert_eq!(parse_args("ls"), vec![vec!["ls"]]);
    }

    #[test]
    fn extra_whitespace() {
        assert_eq!(parse_args("  echo   hello  "), vec![vec!["echo", "hello"]]);
    }

    #[test]
    fn tabs_as_separators() {
        assert_eq!(parse_args("echo\ta\t\tb"), vec![vec!["echo", "a", "b"]]);
    }

    // ── クォート ──

    #[test]
    fn double_quotes_preserve_whitespace() {
        assert_eq!(
            parse_args("cmd \"a  b\" c"),
            vec![vec!["cmd", "a  b", "c"]],
        );
    }

    #[test]
    fn empty_quotes() {
        assert_eq!(parse_args("echo \"\""), vec![vec!["echo", ""]]);
    }

    #[test]
    fn quoted_redirect_chars_are_literal() {
        let p = parse("echo \"a > b\"").unwrap().unwrap();
        assert_eq!(p.commands[0].args, vec!["echo", "a > b"]);
        assert_eq!(p.commands[0].output_file, None);
    }

    // ── パイプライン ──

    #[test]
    fn two_stage_pipeline() {
        assert_eq!(
            parse_args("ls | grep Cargo"),
            vec![vec!["ls"], vec!["grep", "Cargo"]],
        );
    }

    #[test]
    fn three_stage_pipeline() {
        assert_eq!(
            parse_args("cat file | grep name | head -1"),
            vec![
                vec!["cat", "file"],
                vec!["grep", "name"],
                vec!["head", "-1"],
            ],
        );
    }

    #[test]
    fn empty_segment_dropped() {
        // 空セグメントはエラーではなく黙って捨てる（strtok 互換）
        assert_eq!(parse_args("ls | | grep x"), vec![vec!["ls"], vec!["grep", "x"]]);
        assert_eq!(parse_args("| ls"), vec![vec!["ls"]]);
        assert_eq!(parse_args("ls |"), vec![vec!["ls"]]);
    }

    // ── リダイレクト ──

    #[test]
    fn redirect_extraction() {
        let p = parse("sort < in.txt > out.txt").unwrap().unwrap();
        assert_eq!(p.commands.len(), 1);
        assert_eq!(p.commands[0].args, vec!["sort"]);
        assert_eq!(p.commands[0].input_file, Some("in.txt"));
        assert_eq!(p.commands[0].output_file, Some("out.txt"));
    }

    #[test]
    fn redirect_interleaved_with_args() {
        let p = parse("grep > out.txt foo < in.txt bar").unwrap().unwrap();
        assert_eq!(p.commands[0].args, vec!["grep", "foo", "bar"]);
        assert_eq!(p.commands[0].input_file, Some("in.txt"));
        assert_eq!(p.commands[0].output_file, Some("out.txt"));
    }

    #[test]
    fn redirect_last_wins() {
        let p = parse("cmd > a.txt > b.txt").unwrap().unwrap();
        assert_eq!(p.commands[0].output_file, Some("b.txt"));
    }

    #[test]
    fn glued_redirect_is_plain_word() {
        // `>out` は単独トークンでないため通常引数になる
        let p = parse("echo >out").unwrap().unwrap();
        assert_eq!(p.commands[0].args, vec!["echo", ">out"]);
        assert_eq!(p.commands[0].output_file, None);
    }

    #[test]
    fn pipeline_with_redirects() {
        let p = parse("cat < in.txt | grep hello > out.txt").unwrap().unwrap();
        assert_eq!(p.commands.len(), 2);
        assert_eq!(p.commands[0].input_file, Some("in.txt"));
        assert_eq!(p.commands[1].output_file, Some("out.txt"));
    }

    // ── 空入力 ──

    #[test]
    fn empty_input() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   ").unwrap().is_none());
        assert!(parse("\t\n").unwrap().is_none());
    }

    #[test]
    fn only_pipes_is_no_command() {
        assert!(parse("|").unwrap().is_none());
        assert!(parse(" | | ").unwrap().is_none());
    }

    // ── エラーケース ──

    #[test]
    fn err_unterminated_quote() {
        assert_eq!(parse("echo \"hello"), Err(ParseError::UnterminatedQuote));
    }

    #[test]
    fn err_missing_redirect_target() {
        assert_eq!(parse("echo >"), Err(ParseError::MissingRedirectTarget));
        assert_eq!(parse("sort <"), Err(ParseError::MissingRedirectTarget));
    }

    #[test]
    fn err_redirect_followed_by_redirect() {
        assert_eq!(parse("sort < > out"), Err(ParseError::MissingRedirectTarget));
    }

    #[test]
    fn err_redirect_without_command() {
        // ターゲットは存在するのでターゲット欠落ではなくコマンド欠落
        assert_eq!(parse("> out.txt"), Err(ParseError::MissingCommand));
        assert_eq!(parse("< in.txt"), Err(ParseError::MissingCommand));
        assert_eq!(parse("cat x | > out.txt"), Err(ParseError::MissingCommand));
    }

    // ── 上限 ──

    #[test]
    fn max_commands_ok() {
        let line = vec!["a"; CMD_MAX].join(" | ");
        let p = parse(&line).unwrap().unwrap();
        assert_eq!(p.commands.len(), CMD_MAX);
    }

    #[test]
    fn err_too_many_commands() {
        let line = vec!["a"; CMD_MAX + 1].join("|");
        assert_eq!(parse(&line), Err(ParseError::TooManyCommands));
    }

    #[test]
    fn err_too_many_commands_raw_count() {
        // 生分割（trim 前）のカウントで即失敗。空セグメントでも段数に数える。
        let line = "|".repeat(CMD_MAX);
        assert_eq!(parse(&line), Err(ParseError::TooManyCommands));
    }

    #[test]
    fn max_args_ok() {
        let line = vec!["a"; CMD_ARGV_MAX].join(" ");
        let p = parse(&line).unwrap().unwrap();
        assert_eq!(p.commands[0].args.len(), CMD_ARGV_MAX);
    }

    #[test]
    fn err_too_many_args() {
        let line = vec!["a"; CMD_ARGV_MAX + 1].join(" ");
        assert_eq!(parse(&line), Err(ParseError::TooManyArguments));
    }

    #[test]
    fn err_exe_too_long() {
        let line = "x".repeat(EXE_MAX + 1);
        assert_eq!(parse(&line), Err(ParseError::CommandTooLong));
    }

    #[test]
    fn exe_at_limit_ok() {
        let line = "x".repeat(EXE_MAX);
        let p = parse(&line).unwrap().unwrap();
        assert_eq!(p.commands[0].args.len(), 1);
    }

    #[test]
    fn err_arg_too_long() {
        let line = format!("echo {}", "y".repeat(ARG_MAX + 1));
        assert_eq!(parse(&line), Err(ParseError::CommandTooLong));
    }

    #[test]
    fn err_redirect_target_too_long() {
        // ターゲットも ARG_MAX に従う（通常引数と同じ上限）
        let line = format!("cat > {}", "t".repeat(ARG_MAX + 1));
        assert_eq!(parse(&line), Err(ParseError::CommandTooLong));
    }

    #[test]
    fn redirect_target_at_limit_ok() {
        let target = "t".repeat(ARG_MAX);
        let line = format!("cat > {}", target);
        let p = parse(&line).unwrap().unwrap();
        assert_eq!(p.commands[0].output_file, Some(target.as_str()));
    }

    #[test]
    fn err_line_too_long() {
        let line = " ".repeat(SH_CMD_MAX + 1);
        assert_eq!(parse(&line), Err(ParseError::LineTooLong));
    }

    // ── エラーメッセージ ──

    #[test]
    fn error_display() {
        assert_eq!(
            ParseError::TooManyCommands.to_string(),
            format!("error: piping limited to {} commands", CMD_MAX),
        );
        assert_eq!(ParseError::UnterminatedQuote.to_string(), "error: unmatched quote");
    }
}
