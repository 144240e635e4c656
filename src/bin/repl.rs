use std::borrow::Cow;

use glipso::lexer::TokenKind;
use glipso::{Env, Environment, load_prelude, logging, primitives, run, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "glipso_history.txt";

struct GlipsoCompleter {
    env: Env,
}

impl rustyline::completion::Completer for GlipsoCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]).map(|tokens| tokens.last().map(|t| t.kind.clone())) {
            Ok(Some(TokenKind::Symbol(prefix))) => prefix,
            _ => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .into_iter()
            .chain(primitives::names().map(str::to_string))
            .filter(|id| id.starts_with(&prefix) && id.len() > prefix.len())
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        candidates.sort();
        candidates.dedup();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: BracketValidator,
    #[rustyline(Highlighter)]
    highlighter: BracketHighlighter,
    #[rustyline(Completer)]
    completer: GlipsoCompleter,
}

fn is_pair(opening: char, closing: char) -> bool {
    matches!((opening, closing), ('(', ')') | ('[', ']'))
}

// Tracks whether the scan is inside a string literal, where brackets
// do not count.
#[derive(Default)]
struct StringTracker {
    in_string: bool,
    escape: bool,
}

impl StringTracker {
    /// Feeds `c` and reports whether it belongs to a string literal.
    fn consume(&mut self, c: char) -> bool {
        if !self.in_string {
            self.in_string = c == '"';
            return self.in_string;
        }
        if self.escape {
            self.escape = false;
        } else if c == '\\' {
            self.escape = true;
        } else if c == '"' {
            self.in_string = false;
        }
        true
    }
}

struct BracketValidator;

impl Validator for BracketValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut open = Vec::new();
        let mut strings = StringTracker::default();

        for (i, c) in ctx.input().chars().enumerate() {
            if strings.consume(c) {
                continue;
            }
            match c {
                '(' | '[' => open.push(c),
                ')' | ']' if open.pop().is_some_and(|opening| is_pair(opening, c)) => {}
                ')' | ']' => {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched '{}' at position {}",
                        c, i
                    ))));
                }
                _ => {}
            }
        }

        if strings.in_string || !open.is_empty() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

const GREEN: &str = "\x1b[32m";
const BLUE: &str = "\x1b[34m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const RED: &str = "\x1b[31m";
const BOLD_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

fn paint(out: &mut String, color: &str, c: char) {
    out.push_str(color);
    out.push(c);
    out.push_str(RESET);
}

// An opening bracket still waiting for its partner. `source` indexes the
// input line, `output` the coloured buffer, which grows faster.
struct OpenBracket {
    c: char,
    source: usize,
    output: usize,
}

struct BracketHighlighter;

impl Highlighter for BracketHighlighter {
    // Strings are green, the bracket pair touching the cursor is blue and
    // unmatched brackets are red.
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut open: Vec<OpenBracket> = Vec::new();
        let mut out = String::new();
        let mut strings = StringTracker::default();

        for (i, c) in line.char_indices() {
            if strings.consume(c) {
                paint(&mut out, GREEN, c);
                continue;
            }
            match c {
                '(' | '[' => {
                    open.push(OpenBracket {
                        c,
                        source: i,
                        output: out.len(),
                    });
                    out.push(c);
                }
                ')' | ']' => match open.pop() {
                    Some(opening) if is_pair(opening.c, c) => {
                        if opening.source + 1 == pos || i + 1 == pos {
                            paint(&mut out, BLUE, c);
                            recolor(&mut out, &opening, BOLD_BLUE);
                        } else {
                            out.push(c);
                        }
                    }
                    Some(opening) => {
                        paint(&mut out, RED, c);
                        recolor(&mut out, &opening, BOLD_RED);
                    }
                    None => paint(&mut out, RED, c),
                },
                _ => out.push(c),
            }
        }

        Cow::Owned(out)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn recolor(out: &mut String, opening: &OpenBracket, color: &str) {
    let at = opening.output;
    out.replace_range(at..=at, &format!("{color}{}{RESET}", opening.c));
}

fn main() -> rustyline::Result<()> {
    logging::init();
    println!("glipso REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = Environment::new();
    if let Err(err) = load_prelude(&global_env) {
        eprintln!("failed to load prelude: {}", err);
        return Ok(());
    }
    let helper = InputHelper {
        highlighter: BracketHighlighter,
        validator: BracketValidator,
        completer: GlipsoCompleter {
            env: global_env.clone(),
        },
    };
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("glipso> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }
                match run(input, &global_env) {
                    Ok(value) => println!("{}", value),
                    Err(err) => {
                        if err.pretty_print("repl", input).is_err() {
                            eprintln!("Error: {}", err);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
