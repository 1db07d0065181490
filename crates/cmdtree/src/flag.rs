use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{Context, FlagRef};
use crate::error::Result;
use crate::value::{Kind, SetFn, Value};

/// Per-occurrence flag hook. Runs with the resolution context positioned at
/// the command the flag was parsed on, so it can push tokens or environment
/// entries back into the stream.
pub type FlagHook = Arc<dyn Fn(&mut Context<'_>, &Flag) -> Result<()> + Send + Sync>;

/// Post-resolution validator, run before any command hook.
pub type CheckFn = Arc<dyn Fn(FlagRef<'_, '_>) -> Result<()> + Send + Sync>;

/// Value completer: receives the partial value text, returns candidates.
pub type CompleteFn = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// A named, typed setting declared on a command.
///
/// The name is a comma-separated alias list; the first entry is canonical.
/// One-character aliases are written `-x`, longer ones `--name`.
#[derive(Clone)]
pub struct Flag {
    name: String,
    description: String,
    usage: String,
    pub(crate) kind: Kind,
    pub(crate) default: Value,
    hidden: bool,
    required: bool,
    local: bool,
    pub(crate) at_file: bool,
    pub(crate) bare: Option<String>,
    pub(crate) before: Option<FlagHook>,
    pub(crate) after: Option<FlagHook>,
    pub(crate) completer: Option<CompleteFn>,
    pub(crate) check: Option<CheckFn>,
}

impl Flag {
    fn with_kind(name: impl Into<String>, kind: Kind, default: Value, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: help.into(),
            usage: String::new(),
            kind,
            default,
            hidden: false,
            required: false,
            local: false,
            at_file: false,
            bare: None,
            before: None,
            after: None,
            completer: None,
            check: None,
        }
    }

    /// `--name`, `--name=false`; never consumes the next token.
    pub fn bool(name: impl Into<String>, default: bool, help: impl Into<String>) -> Self {
        Self::with_kind(name, Kind::Bool, Value::Bool(default), help)
    }

    /// Signed 64-bit integer.
    pub fn int(name: impl Into<String>, default: i64, help: impl Into<String>) -> Self {
        Self::with_kind(name, Kind::Int, Value::Int(default), help)
    }

    /// Unsigned 64-bit integer; negative values are rejected.
    pub fn uint(name: impl Into<String>, default: u64, help: impl Into<String>) -> Self {
        Self::with_kind(name, Kind::Uint, Value::Uint(default), help)
    }

    /// 64-bit float.
    pub fn float(name: impl Into<String>, default: f64, help: impl Into<String>) -> Self {
        Self::with_kind(name, Kind::Float, Value::Float(default), help)
    }

    /// Free-form text, taken verbatim.
    pub fn string(name: impl Into<String>, default: impl Into<String>, help: impl Into<String>) -> Self {
        Self::with_kind(name, Kind::Str, Value::Str(default.into()), help)
    }

    /// Compound duration such as `1h30m` or `250ms`.
    pub fn duration(name: impl Into<String>, default: Duration, help: impl Into<String>) -> Self {
        Self::with_kind(name, Kind::Duration, Value::Duration(default), help)
    }

    /// Repeatable flag: every occurrence appends one value.
    pub fn strings<I, S>(name: impl Into<String>, default: I, help: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let default = default.into_iter().map(Into::into).collect();
        Self::with_kind(name, Kind::List, Value::List(default), help)
    }

    /// Flag of a user type `T`, parsed by `parse`.
    ///
    /// Read it back with [`Scope::custom`](crate::Scope::custom).
    pub fn custom<T, P>(name: impl Into<String>, default: T, help: impl Into<String>, parse: P) -> Self
    where
        T: Any + Send + Sync,
        P: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let set: SetFn = Arc::new(move |raw: &str| -> anyhow::Result<Arc<dyn Any + Send + Sync>> {
            Ok(Arc::new(parse(raw)?))
        });
        Self::with_kind(name, Kind::Custom(set), Value::Custom(Arc::new(default)), help)
    }

    /// Value placeholder shown by help renderers, e.g. `=<file>`.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Left out of completion candidates.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Must be set from argv, environment or a file before the action runs.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Visible only on the command that declares it, not inherited by subcommands.
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Values of the form `@path` are replaced by the file's contents.
    pub fn at_file(mut self) -> Self {
        self.at_file = true;
        self
    }

    /// Given without an inline value, the flag parses `bare` instead of
    /// consuming the next token: `--color` means `--color=<bare>`.
    pub fn optional_value(mut self, bare: impl Into<String>) -> Self {
        self.bare = Some(bare.into());
        self
    }

    /// Runs on every occurrence before the value is read.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Flag) -> Result<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Runs on every occurrence once the value is stored.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Flag) -> Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Candidates for this flag's value in completion mode.
    pub fn complete_with<F>(mut self, complete: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.completer = Some(Arc::new(complete));
        self
    }

    /// Validate the resolved flag before the command hooks run. Replaces
    /// the [`required`](Self::required) test for this flag.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(FlagRef<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Full comma-separated alias list.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical name: the first alias.
    pub fn main_name(&self) -> &str {
        main_name(&self.name)
    }

    /// Aliases in declaration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        aliases(&self.name)
    }

    /// Whether `name` (without dashes) is one of the aliases.
    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases().any(|a| a == name)
    }

    /// One-line help text.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Value placeholder set with [`usage`](Self::usage).
    pub fn usage_text(&self) -> &str {
        &self.usage
    }

    /// Declared default.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// `bool`, `int`, `string` and so on.
    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Whether a bare occurrence consumes the next token as its value.
    pub fn takes_value(&self) -> bool {
        self.kind.takes_value() && self.bare.is_none()
    }

    /// Whether the flag is hidden from completion.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the flag must be set before the action runs.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether subcommands inherit the flag.
    pub fn is_local(&self) -> bool {
        self.local
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("default", &self.default)
            .field("hidden", &self.hidden)
            .field("required", &self.required)
            .field("local", &self.local)
            .field("bare", &self.bare)
            .finish_non_exhaustive()
    }
}

pub(crate) fn main_name(names: &str) -> &str {
    names.split(',').next().unwrap_or(names).trim()
}

pub(crate) fn aliases(names: &str) -> impl Iterator<Item = &str> {
    names.split(',').map(str::trim).filter(|a| !a.is_empty())
}

/// `-x` for one-character aliases, `--name` otherwise.
pub(crate) fn dashed(alias: &str) -> String {
    if alias.chars().count() == 1 {
        format!("-{alias}")
    } else {
        format!("--{alias}")
    }
}
