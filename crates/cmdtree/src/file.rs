//! File expansion: `--flagfile` splices shell-quoted tokens into argv,
//! `--envfile` feeds `KEY=VALUE` lines through the environment overlay,
//! and `@path` values of [`Flag::at_file`] flags read the value from a file.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::value::Value;

const MAX_FLAGFILE_DEPTH: usize = 16;

impl Flag {
    /// `--flagfile=<path>[?]`, alias `--ff`: parse the file's contents as if
    /// they stood in place of the flag. A trailing `?` tolerates a missing file.
    pub fn flagfile() -> Self {
        Flag::string("flagfile,ff", "", "read more flags and arguments from a file")
            .usage("=<path>[?]")
            .after(expand_flagfile)
    }

    /// `--envfile=<path>[?]`: read `KEY=VALUE` lines as environment entries for
    /// the command the flag was given to.
    pub fn envfile() -> Self {
        Flag::string("envfile", "", "read environment variables from a file")
            .usage("=<path>[?]")
            .after(expand_envfile)
    }
}

fn current_path(ctx: &Context<'_>, flag: &Flag) -> Option<String> {
    ctx.value_of(flag)
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}

fn expand_flagfile(ctx: &mut Context<'_>, flag: &Flag) -> Result<()> {
    let Some(target) = current_path(ctx, flag) else {
        return Ok(());
    };
    let Some((path, text)) = read_optional(&target)? else {
        return Ok(());
    };
    let tokens = tokenize_flagfile(&text).ok_or_else(|| Error::Flagfile {
        path: path.clone(),
        reason: "unterminated quote or trailing backslash".to_string(),
    })?;

    let canonical = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
    let remaining = ctx.rest.len();
    ctx.flagfiles.retain(|(_, follow)| *follow <= remaining);
    if ctx.flagfiles.iter().any(|(open, _)| *open == canonical) {
        return Err(Error::Flagfile {
            path,
            reason: "recursive flagfile".to_string(),
        });
    }
    if ctx.flagfiles.len() >= MAX_FLAGFILE_DEPTH {
        return Err(Error::Flagfile {
            path,
            reason: format!("flagfiles nested deeper than {MAX_FLAGFILE_DEPTH}"),
        });
    }
    ctx.flagfiles.push((canonical, remaining));

    debug!(path = %path.display(), tokens = tokens.len(), depth = ctx.flagfiles.len(), "flagfile");
    ctx.push_args(tokens);
    Ok(())
}

fn expand_envfile(ctx: &mut Context<'_>, flag: &Flag) -> Result<()> {
    let Some(target) = current_path(ctx, flag) else {
        return Ok(());
    };
    let Some((path, text)) = read_optional(&target)? else {
        return Ok(());
    };
    let entries = parse_envfile(&path, &text)?;
    debug!(path = %path.display(), entries = entries.len(), "envfile");
    ctx.overlay_env(entries)
}

/// Read the file named by `target`. With a trailing `?` a missing file is
/// `Ok(None)` instead of an error.
pub(crate) fn read_optional(target: &str) -> Result<Option<(PathBuf, String)>> {
    let (path, optional) = match target.strip_suffix('?') {
        Some(path) => (Path::new(path), true),
        None => (Path::new(target), false),
    };
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some((path.to_path_buf(), text))),
        Err(err) if optional && err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "optional file missing");
            Ok(None)
        }
        Err(source) => Err(Error::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Split flagfile text into tokens: whitespace-separated, `'` and `"`
/// quoting, backslash escapes, `#` comments. `None` on unbalanced quoting.
pub fn tokenize_flagfile(text: &str) -> Option<Vec<String>> {
    shlex::split(&text.replace("\r\n", "\n"))
}

/// Turn envfile text into `KEY=VALUE` entries.
///
/// Values are taken literally: no `$VAR` substitution and no escapes. One
/// pair of matching surrounding quotes is removed. A bare `KEY` becomes `KEY=`.
pub(crate) fn parse_envfile(path: &Path, text: &str) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map_or(line, str::trim);
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let key = key.trim_end();
        if key.is_empty() {
            return Err(Error::Envfile {
                path: path.to_path_buf(),
                reason: format!("line {}: empty variable name", n + 1),
            });
        }
        entries.push(format!("{key}={}", unquote(value.trim_start())));
    }
    Ok(entries)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Resolve an `@path` value to the file's contents, minus one trailing newline.
pub(crate) fn expand_at_file(raw: &str) -> Result<String> {
    let Some(path) = raw.strip_prefix('@') else {
        return Ok(raw.to_string());
    };
    let mut text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: PathBuf::from(path),
        source,
    })?;
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flagfile_tokens_follow_shell_quoting() {
        let tokens = tokenize_flagfile("-a \"s t r\" 'x y'\n# comment --b\n--c=d\\ e\r\n").unwrap();
        assert_eq!(tokens, vec!["-a", "s t r", "x y", "--c=d e"]);
    }

    #[test]
    fn flagfile_unbalanced_quote() {
        assert!(tokenize_flagfile("-a \"open").is_none());
    }

    #[test]
    fn envfile_lines() {
        let text = "# comment\n\nexport A=1\nB\nC=\"quoted value\"\n  export D=4\n";
        let entries = parse_envfile(Path::new("test.env"), text).unwrap();
        assert_eq!(entries, vec!["A=1", "B=", "C=quoted value", "D=4"]);
    }

    #[test]
    fn envfile_values_are_literal() {
        let text = "PASS=pa$word\nHOME_DIR=$HOME/x\nQ='$single'\nEQ=a=b\nMIXED=\"x'\n";
        let entries = parse_envfile(Path::new("test.env"), text).unwrap();
        assert_eq!(
            entries,
            vec!["PASS=pa$word", "HOME_DIR=$HOME/x", "Q=$single", "EQ=a=b", "MIXED=\"x'"]
        );

        let err = parse_envfile(Path::new("test.env"), "A=1\n=oops\n").unwrap_err();
        assert_eq!(err.to_string(), "envfile test.env: line 2: empty variable name");
    }

    #[test]
    fn optional_marker_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.flags");
        let target = format!("{}?", missing.display());
        assert!(read_optional(&target).unwrap().is_none());

        let err = read_optional(&missing.display().to_string()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err:?}");
    }

    #[test]
    fn at_file_reads_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "secret\n").unwrap();
        assert_eq!(expand_at_file(&format!("@{}", path.display())).unwrap(), "secret");
        assert_eq!(expand_at_file("plain").unwrap(), "plain");
    }
}
