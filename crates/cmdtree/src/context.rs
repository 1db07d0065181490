//! Per-invocation resolution state.
//!
//! A [`Context`] is built fresh by every run. It holds the chain of commands
//! resolved so far (root first), one value slot per declared flag on each of
//! them, the positional arguments bound to each node, and the remaining token
//! and environment streams. The declaration tree is only ever borrowed.

use std::cell::{RefCell, RefMut};
use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::command::Command;
use crate::flag::Flag;
use crate::value::Value;

/// Where a flag's current value came from. Later sources outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Source {
    Default,
    Env,
    Argv,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) value: Value,
    pub(crate) source: Source,
}

impl Slot {
    pub(crate) fn is_set(&self) -> bool {
        self.source != Source::Default
    }
}

/// One resolved command level.
pub(crate) struct Frame<'a> {
    pub(crate) cmd: &'a Command,
    pub(crate) slots: Vec<Slot>,
    pub(crate) args: Option<Vec<String>>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(cmd: &'a Command) -> Self {
        Self {
            cmd,
            slots: cmd
                .flags
                .iter()
                .map(|f| Slot {
                    value: f.default.clone(),
                    source: Source::Default,
                })
                .collect(),
            args: cmd.args.then(Vec::new),
        }
    }
}

/// Position of a flag: the frame that declares it and its index there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlagPos {
    pub(crate) depth: usize,
    pub(crate) index: usize,
}

/// Resolution state of one run.
///
/// Flag hooks receive `&mut Context` positioned at the command the flag was
/// parsed on and may feed tokens ([`push_args`](Self::push_args)) or
/// environment entries ([`overlay_env`](Self::overlay_env)) back into the
/// stream.
pub struct Context<'a> {
    pub(crate) frames: Vec<Frame<'a>>,
    pub(crate) depth: usize,
    pub(crate) rest: VecDeque<String>,
    pub(crate) after_terminator: bool,
    pub(crate) source: Source,
    pub(crate) env: Vec<String>,
    pub(crate) completion: Option<String>,
    pub(crate) pending: Option<FlagPos>,
    /// Flagfiles being expanded: canonical path and the number of tokens
    /// that followed the flag. A file is open while at least that many remain.
    pub(crate) flagfiles: Vec<(PathBuf, usize)>,
    argv: Vec<String>,
    os_env: Vec<String>,
    out: RefCell<Box<dyn Write + 'a>>,
}

impl<'a> Context<'a> {
    /// `argv[0]` is the program name and is not parsed.
    pub(crate) fn new(
        root: &'a Command,
        argv: Vec<String>,
        env: Vec<String>,
        out: Box<dyn Write + 'a>,
    ) -> Self {
        Self {
            frames: vec![Frame::new(root)],
            depth: 0,
            rest: argv.iter().skip(1).cloned().collect(),
            after_terminator: false,
            source: Source::Argv,
            env: env.clone(),
            completion: None,
            pending: None,
            flagfiles: Vec::new(),
            argv,
            os_env: env,
            out: RefCell::new(out),
        }
    }

    /// Read-only view of the command currently being parsed.
    pub fn scope(&self) -> Scope<'_, 'a> {
        self.scope_at(self.depth)
    }

    pub(crate) fn scope_at(&self, depth: usize) -> Scope<'_, 'a> {
        Scope { ctx: self, depth }
    }

    /// The command currently being parsed.
    pub fn command(&self) -> &'a Command {
        self.frames[self.depth].cmd
    }

    /// Splice `tokens` in front of the remaining arguments, keeping their order.
    pub fn push_args<I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = String>,
    {
        let tokens: Vec<String> = tokens.into_iter().collect();
        for token in tokens.into_iter().rev() {
            self.rest.push_front(token);
        }
    }

    /// Tokens not yet consumed.
    pub fn remaining_args(&self) -> impl Iterator<Item = &str> {
        self.rest.iter().map(String::as_str)
    }

    /// The value `flag` currently holds in this run.
    pub fn value_of(&self, flag: &Flag) -> Option<&Value> {
        self.frames.iter().find_map(|frame| {
            frame
                .cmd
                .flags
                .iter()
                .position(|f| std::ptr::eq(f, flag))
                .map(|index| &frame.slots[index].value)
        })
    }

    /// True while answering a completion request.
    pub fn is_completing(&self) -> bool {
        self.completion.is_some()
    }

    /// The run's output sink.
    pub fn stdout(&self) -> RefMut<'_, Box<dyn Write + 'a>> {
        self.out.borrow_mut()
    }

    /// Scoped flag lookup from `depth` up to the root.
    ///
    /// A local flag is found only when `depth` is the command declaring it.
    pub(crate) fn lookup(&self, depth: usize, name: &str) -> Option<FlagPos> {
        (0..=depth).rev().find_map(|d| {
            self.frames[d]
                .cmd
                .flags
                .iter()
                .position(|f| (d == depth || !f.is_local()) && f.has_alias(name))
                .map(|index| FlagPos { depth: d, index })
        })
    }

    pub(crate) fn flag_at(&self, pos: FlagPos) -> &'a Flag {
        let cmd: &'a Command = self.frames[pos.depth].cmd;
        &cmd.flags[pos.index]
    }

    pub(crate) fn flag_ref(&self, pos: FlagPos) -> FlagRef<'_, 'a> {
        FlagRef {
            flag: self.flag_at(pos),
            slot: self.slot(pos),
            owner: self.frames[pos.depth].cmd,
        }
    }

    pub(crate) fn slot(&self, pos: FlagPos) -> &Slot {
        &self.frames[pos.depth].slots[pos.index]
    }

    pub(crate) fn slot_mut(&mut self, pos: FlagPos) -> &mut Slot {
        &mut self.frames[pos.depth].slots[pos.index]
    }

    /// Main names of the commands from the root down to `depth`.
    pub(crate) fn path(&self, depth: usize) -> Vec<&'a str> {
        self.frames[..=depth]
            .iter()
            .map(|f| f.cmd.main_name())
            .collect()
    }
}

/// A resolved flag as seen from some command.
#[derive(Clone, Copy)]
pub struct FlagRef<'c, 'a> {
    flag: &'a Flag,
    slot: &'c Slot,
    owner: &'a Command,
}

impl<'c, 'a> FlagRef<'c, 'a> {
    /// The declaration.
    pub fn flag(&self) -> &'a Flag {
        self.flag
    }

    /// Current value: resolved, or the default.
    pub fn value(&self) -> &'c Value {
        &self.slot.value
    }

    /// Set explicitly from argv, the environment or a file (not just defaulted).
    pub fn is_set(&self) -> bool {
        self.slot.is_set()
    }

    /// The command declaring the flag.
    pub fn owner(&self) -> &'a Command {
        self.owner
    }
}

/// Read-only view of one resolved command, handed to command hooks.
#[derive(Clone, Copy)]
pub struct Scope<'c, 'a> {
    ctx: &'c Context<'a>,
    depth: usize,
}

impl<'c, 'a> Scope<'c, 'a> {
    /// The command this scope views.
    pub fn command(&self) -> &'a Command {
        self.ctx.frames[self.depth].cmd
    }

    /// The enclosing command; `None` at the root.
    pub fn parent(&self) -> Option<Scope<'c, 'a>> {
        self.depth.checked_sub(1).map(|depth| Scope {
            ctx: self.ctx,
            depth,
        })
    }

    /// The root command's scope.
    pub fn root(&self) -> Scope<'c, 'a> {
        Scope {
            ctx: self.ctx,
            depth: 0,
        }
    }

    /// Distance from the root: 0 for the root command.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Main names from the root down to this command.
    pub fn path(&self) -> Vec<&'a str> {
        self.ctx.path(self.depth)
    }

    /// Positional arguments bound to this command; `None` if it accepts none.
    pub fn args(&self) -> Option<&'c [String]> {
        self.ctx.frames[self.depth].args.as_deref()
    }

    /// Flag visible from this command under `name`, local flags included only here.
    pub fn flag(&self, name: &str) -> Option<FlagRef<'c, 'a>> {
        let pos = self.ctx.lookup(self.depth, name)?;
        Some(self.flag_ref(pos))
    }

    fn flag_ref(&self, pos: FlagPos) -> FlagRef<'c, 'a> {
        let ctx: &'c Context<'a> = self.ctx;
        ctx.flag_ref(pos)
    }

    /// Value of the flag visible under `name`.
    pub fn value(&self, name: &str) -> Option<&'c Value> {
        self.flag(name).map(|f| f.value())
    }

    /// Whether the flag under `name` was set from any source.
    pub fn is_set(&self, name: &str) -> bool {
        self.flag(name).is_some_and(|f| f.is_set())
    }

    /// `None` when no flag `name` is visible or it is not a bool flag.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.value(name)?.as_bool()
    }

    /// Signed integer value of flag `name`.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name)?.as_int()
    }

    /// Unsigned integer value of flag `name`.
    pub fn uint(&self, name: &str) -> Option<u64> {
        self.value(name)?.as_uint()
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.value(name)?.as_float()
    }

    /// Borrowed string value of flag `name`.
    pub fn string(&self, name: &str) -> Option<&'c str> {
        self.value(name)?.as_str()
    }

    pub fn duration(&self, name: &str) -> Option<Duration> {
        self.value(name)?.as_duration()
    }

    /// Accumulated values of list flag `name`.
    pub fn strings(&self, name: &str) -> Option<&'c [String]> {
        self.value(name)?.as_list()
    }

    /// Value of a custom flag, downcast to `T`.
    pub fn custom<T: std::any::Any>(&self, name: &str) -> Option<&'c T> {
        self.value(name)?.downcast_ref()
    }

    /// Every flag settable from here: own flags first, then inherited
    /// non-local flags, nearest ancestor first. Fully shadowed flags are skipped.
    pub fn flags_in_scope(&self) -> Vec<FlagRef<'c, 'a>> {
        let mut seen: HashSet<&'a str> = HashSet::new();
        let mut out = Vec::new();
        for d in (0..=self.depth).rev() {
            let cmd: &'a Command = self.ctx.frames[d].cmd;
            for (index, flag) in cmd.flags.iter().enumerate() {
                if d != self.depth && flag.is_local() {
                    continue;
                }
                let reachable = flag.aliases().any(|a| !seen.contains(a));
                seen.extend(flag.aliases());
                if reachable {
                    out.push(self.flag_ref(FlagPos { depth: d, index }));
                }
            }
        }
        out
    }

    /// Main names of explicitly set flags on this command and its ancestors, root first.
    pub fn flags_set(&self) -> Vec<&'a str> {
        self.ctx.frames[..=self.depth]
            .iter()
            .flat_map(|frame| {
                frame
                    .cmd
                    .flags
                    .iter()
                    .zip(&frame.slots)
                    .filter(|(_, slot)| slot.is_set())
                    .map(|(flag, _)| flag.main_name())
            })
            .collect()
    }

    /// Look up `key` in the environment entries no flag consumed.
    pub fn lookup_env(&self, key: &str) -> Option<&'c str> {
        self.ctx.env.iter().find_map(|entry| match entry.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if entry == key => Some(""),
            _ => None,
        })
    }

    /// Like [`lookup_env`](Self::lookup_env), empty when absent.
    pub fn getenv(&self, key: &str) -> &'c str {
        self.lookup_env(key).unwrap_or_default()
    }

    /// Environment entries no flag consumed.
    pub fn env(&self) -> &'c [String] {
        &self.ctx.env
    }

    /// The environment exactly as passed to the run.
    pub fn os_env(&self) -> &'c [String] {
        &self.ctx.os_env
    }

    /// The argv exactly as passed to the run, program name included.
    pub fn argv(&self) -> &'c [String] {
        &self.ctx.argv
    }

    /// Word being completed, when the run is a completion request.
    pub fn completion_prefix(&self) -> Option<&'c str> {
        self.ctx.completion.as_deref()
    }

    /// The run's output sink.
    pub fn stdout(&self) -> RefMut<'c, Box<dyn Write + 'a>> {
        self.ctx.stdout()
    }
}
