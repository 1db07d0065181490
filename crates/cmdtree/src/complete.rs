//! Shell completion.
//!
//! The shell calls the program with the command line in `CLI_COMP_LINE`
//! (plus optionally the word index and cursor offset). Instead of running an
//! action the program prints a bash snippet assigning `COMPREPLY`.

use std::io::Write as _;

use indexmap::IndexSet;
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::flag::{self, Flag};
use crate::resolve::pending_flag;
use crate::token::split_flag;

/// Full command line being completed. Its presence switches completion on.
pub const CLI_COMP_LINE: &str = "CLI_COMP_LINE";
/// Index of the word under the cursor (0 is the program name).
pub const CLI_COMP_WORD: &str = "CLI_COMP_WORD";
/// Byte offset of the cursor in the line.
pub const CLI_COMP_POINT: &str = "CLI_COMP_POINT";

/// An in-progress completion request read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub line: String,
    pub word: Option<usize>,
    pub point: Option<usize>,
}

impl CompletionRequest {
    /// `None` unless `CLI_COMP_LINE` is present. Unparsable indexes fall back
    /// to their defaults.
    pub fn from_env(env: &[String]) -> Option<Self> {
        let get = |key: &str| {
            env.iter().find_map(|entry| {
                entry
                    .split_once('=')
                    .filter(|(k, _)| *k == key)
                    .map(|(_, v)| v)
            })
        };
        Some(Self {
            line: get(CLI_COMP_LINE)?.to_string(),
            word: get(CLI_COMP_WORD).and_then(|v| v.trim().parse().ok()),
            point: get(CLI_COMP_POINT).and_then(|v| v.trim().parse().ok()),
        })
    }

    /// Split the line up to the cursor into the words to resolve (program
    /// name excluded) and the word being completed.
    pub fn split(&self) -> (Vec<String>, String) {
        let mut end = self.point.unwrap_or(self.line.len()).min(self.line.len());
        while !self.line.is_char_boundary(end) {
            end -= 1;
        }
        let line = &self.line[..end];

        let mut words = shlex::split(line)
            .unwrap_or_else(|| line.split_whitespace().map(String::from).collect());
        if words.is_empty() || line.ends_with(char::is_whitespace) {
            words.push(String::new());
        }

        let last = words.len() - 1;
        let index = self.word.unwrap_or(last).min(last);
        let current = words[index].clone();
        let tokens = words.get(1..index).map(<[String]>::to_vec).unwrap_or_default();
        (tokens, current)
    }
}

/// Candidates for the word being completed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub prefix: String,
    pub candidates: Vec<String>,
}

impl Completion {
    /// The bash snippet for the completion function to `eval`.
    pub fn reply(&self) -> String {
        let words: Vec<String> = self.candidates.iter().map(|c| format!("{c:?}")).collect();
        format!(
            "COMPREPLY=( $(compgen -W {} -- {}) )",
            sh_quote(&words.join(" ")),
            sh_quote(&self.prefix)
        )
    }
}

fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Resolve the words before the cursor leniently and answer for the node
/// reached.
pub(crate) fn run_completion(ctx: &mut Context<'_>, req: &CompletionRequest) -> Result<()> {
    let (tokens, current) = req.split();
    debug!(line = req.line.as_str(), prefix = current.as_str(), "completion");

    ctx.rest = tokens.into();
    ctx.completion = Some(current.clone());
    if let Err(err) = ctx.resolve() {
        debug!(error = %err, "completion: resolution stopped early");
    }

    if let Some(hook) = &ctx.command().complete {
        return hook(&ctx.scope());
    }

    let completion = Completion {
        candidates: candidates(ctx, &current),
        prefix: current,
    };
    debug!(candidates = ?completion.candidates, "completion");
    writeln!(ctx.stdout(), "{}", completion.reply()).map_err(Error::Output)
}

fn candidates(ctx: &Context<'_>, current: &str) -> Vec<String> {
    if let Some(flag) = pending_flag(ctx) {
        return complete_value(flag, current);
    }

    let scope = ctx.scope();
    let mut out: IndexSet<String> = IndexSet::new();

    if current.starts_with('-') && !ctx.after_terminator {
        let ft = split_flag(current);
        if let Some(value) = ft.value {
            let shown = &current[..current.len() - value.len()];
            if let Some(f) = scope.flag(ft.name) {
                out.extend(
                    complete_value(f.flag(), value)
                        .into_iter()
                        .map(|v| format!("{shown}{v}")),
                );
            }
            return out.into_iter().collect();
        }

        for f in scope.flags_in_scope() {
            let flag = f.flag();
            if flag.is_hidden() {
                continue;
            }
            let hit = flag
                .aliases()
                .filter(|a| ft.dashes < 2 || a.chars().count() > 1)
                .find(|a| a.starts_with(ft.name));
            if let Some(alias) = hit {
                out.insert(flag::dashed(alias));
            }
        }
        return out.into_iter().collect();
    }

    let committed = scope.args().is_some_and(|args| !args.is_empty());
    if ctx.after_terminator || committed {
        return Vec::new();
    }
    let hidden_ok = current.starts_with('_');
    for sub in ctx.command().subcommands() {
        if sub.is_hidden() && !hidden_ok {
            continue;
        }
        let hit = sub
            .aliases()
            .filter(|a| a.starts_with('_') == hidden_ok)
            .find(|a| a.starts_with(current));
        if let Some(alias) = hit {
            out.insert(alias.to_string());
        }
    }
    out.into_iter().collect()
}

fn complete_value(flag: &Flag, prefix: &str) -> Vec<String> {
    match &flag.completer {
        Some(complete) => complete(prefix),
        None => Vec::new(),
    }
}
