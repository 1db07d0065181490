use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::Scope;
use crate::error::{Error, Result};
use crate::flag::{self, Flag};

/// Command lifecycle hook (`Before`, `Action`, `After`, completion).
pub type Hook = Arc<dyn Fn(&Scope<'_, '_>) -> Result<()> + Send + Sync>;

/// A node of the static command tree.
///
/// The tree is plain configuration: resolving an invocation never mutates
/// it. Per-run state lives in [`Context`](crate::Context).
#[derive(Clone, Default)]
pub struct Command {
    name: String,
    description: String,
    help: String,
    usage: String,
    pub(crate) flags: Vec<Flag>,
    pub(crate) commands: Vec<Command>,
    pub(crate) args: bool,
    pub(crate) before: Option<Hook>,
    pub(crate) action: Option<Hook>,
    pub(crate) after: Option<Hook>,
    pub(crate) complete: Option<Hook>,
    pub(crate) env_prefix: Option<String>,
    hidden: bool,
}

impl Command {
    /// `name` may be a comma-separated alias list; the first entry is canonical.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// One-line summary.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Long help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Argument synopsis shown after the command name, e.g. `[file...]`.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Declare a flag on this command.
    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Declare several flags at once.
    pub fn flags(mut self, flags: impl IntoIterator<Item = Flag>) -> Self {
        self.flags.extend(flags);
        self
    }

    /// Add a subcommand.
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Accept positional arguments.
    ///
    /// Once the first positional is accepted the command stops trying
    /// further tokens as subcommand names.
    pub fn args(mut self) -> Self {
        self.args = true;
        self
    }

    /// Runs root to leaf before the chosen command's action.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// The command body. Runs on the leaf only.
    pub fn action<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(hook));
        self
    }

    /// Runs leaf to root after the action, whether or not it failed.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Replace the default completion engine for this command.
    pub fn complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.complete = Some(Arc::new(hook));
        self
    }

    /// Environment variables starting with `prefix` are read as flags
    /// (`APP_LOG_LEVEL=debug` -> `--log-level=debug`). Inherited by subcommands.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Reachable by name, but left out of completion unless the prefix starts with `_`.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Full comma-separated alias list.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical name: the first alias.
    pub fn main_name(&self) -> &str {
        flag::main_name(&self.name)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        flag::aliases(&self.name)
    }

    /// Summary set with [`description`](Self::description).
    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Argument synopsis set with [`usage`](Self::usage).
    pub fn usage_text(&self) -> &str {
        &self.usage
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the command binds positional arguments.
    pub fn accepts_args(&self) -> bool {
        self.args
    }

    /// Flags declared on this command, in declaration order.
    pub fn declared_flags(&self) -> &[Flag] {
        &self.flags
    }

    /// Direct subcommands, hidden ones included.
    pub fn subcommands(&self) -> &[Command] {
        &self.commands
    }

    /// Subcommands not marked hidden.
    pub fn visible_commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| !c.hidden)
    }

    /// Flags not marked hidden.
    pub fn visible_flags(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter().filter(|f| !f.is_hidden())
    }

    /// Subcommand matching `name` or one of its aliases.
    pub fn subcommand(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.aliases().any(|a| a == name))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("commands", &self.commands)
            .field("args", &self.args)
            .field("env_prefix", &self.env_prefix)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

/// A validated command tree, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct App {
    pub(crate) root: Command,
}

impl App {
    /// Validate `root` and wrap it.
    ///
    /// Rejects empty names, subcommand aliases shared between siblings, and
    /// flag aliases declared twice on one command. A subcommand may redeclare
    /// an inherited alias: lookup starts at the command itself, so the
    /// nearer declaration wins.
    pub fn new(root: Command) -> Result<Self> {
        validate(&root, &mut Vec::new())?;
        Ok(Self { root })
    }

    /// The validated root command.
    pub fn root(&self) -> &Command {
        &self.root
    }
}

fn validate<'t>(cmd: &'t Command, path: &mut Vec<&'t str>) -> Result<()> {
    if cmd.main_name().is_empty() {
        return Err(Error::Config(format!(
            "empty command name under '{}'",
            path.join(" ")
        )));
    }
    path.push(cmd.main_name());
    let here = path.join(" ");

    let mut flags: IndexMap<&str, &str> = IndexMap::new();
    for f in &cmd.flags {
        if f.main_name().is_empty() {
            return Err(Error::Config(format!("{here}: flag with empty name")));
        }
        for alias in f.aliases() {
            if let Some(prev) = flags.insert(alias, f.main_name()) {
                return Err(Error::Config(format!(
                    "{here}: flag alias '{alias}' refers to both --{prev} and --{}",
                    f.main_name()
                )));
            }
        }
    }

    let mut subs: IndexMap<&str, &str> = IndexMap::new();
    for sub in &cmd.commands {
        for alias in sub.aliases() {
            if let Some(prev) = subs.insert(alias, sub.main_name()) {
                return Err(Error::Config(format!(
                    "{here}: subcommand alias '{alias}' refers to both '{prev}' and '{}'",
                    sub.main_name()
                )));
            }
        }
    }

    for sub in &cmd.commands {
        validate(sub, path)?;
    }
    path.pop();

    Ok(())
}
