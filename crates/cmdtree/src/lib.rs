//! Command-tree argument resolution.
//!
//! Declare a tree of [`Command`]s carrying typed [`Flag`]s, validate it once
//! with [`App::new`], then [`App::run`] it against an argv and an environment
//! any number of times, from any number of threads:
//!
//! - flags resolve from the command being parsed up to the root; local flags
//!   only on the command that declares them
//! - environment entries under a command's prefix act as flags, outranked by
//!   argv
//! - `--flagfile` and `--envfile` splice file contents into the streams
//! - a `CLI_COMP_LINE` environment variable switches the run to shell
//!   completion
//!
//! ```no_run
//! use std::io::Write;
//!
//! use cmdtree::{App, Command, Flag};
//!
//! let app = App::new(
//!     Command::new("greeter")
//!         .env_prefix("GREETER_")
//!         .flag(Flag::string("name", "", "name to greet").required())
//!         .flag(Flag::flagfile())
//!         .action(|scope| {
//!             let name = scope.string("name").unwrap_or_default();
//!             writeln!(scope.stdout(), "hello, {name}").map_err(cmdtree::Error::Output)
//!         }),
//! )?;
//! app.run(std::env::args(), std::env::vars().map(|(k, v)| format!("{k}={v}")))?;
//! # Ok::<(), cmdtree::Error>(())
//! ```

mod command;
mod complete;
mod context;
mod env;
mod error;
mod file;
mod flag;
mod resolve;
mod run;
mod token;
mod value;

pub use command::{App, Command, Hook};
pub use complete::{CLI_COMP_LINE, CLI_COMP_POINT, CLI_COMP_WORD, Completion, CompletionRequest};
pub use context::{Context, FlagRef, Scope};
pub use error::{Error, Result};
pub use file::tokenize_flagfile;
pub use flag::{CheckFn, CompleteFn, Flag, FlagHook};
pub use run::run;
pub use token::{FlagToken, Token, classify, split_flag};
pub use value::{SetFn, Value, parse_bool, parse_duration};
