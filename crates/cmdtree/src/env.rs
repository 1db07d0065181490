//! Environment overlay: `PREFIX_SOME_FLAG=value` entries become
//! `--some-flag=value` on the command being parsed.

use tracing::{debug, trace};

use crate::context::{Context, Source};
use crate::error::Result;

impl<'a> Context<'a> {
    /// The prefix in effect at `depth`: the node's own, else the nearest
    /// ancestor's. An empty prefix disables the overlay.
    pub(crate) fn effective_prefix(&self, depth: usize) -> Option<&'a str> {
        self.frames[..=depth]
            .iter()
            .rev()
            .find_map(|frame| frame.cmd.env_prefix.as_deref())
            .filter(|prefix| !prefix.is_empty())
    }

    /// Apply `entries` as flags of the command being parsed and return the
    /// entries that were not applied, in order.
    ///
    /// Values go through the same parser as argv, but a flag already set from
    /// argv is left alone and its entry is kept.
    pub(crate) fn overlay(&mut self, entries: Vec<String>) -> Result<Vec<String>> {
        let Some(prefix) = self.effective_prefix(self.depth) else {
            return Ok(entries);
        };

        let mut rest = Vec::with_capacity(entries.len());
        for entry in entries {
            let (key, value) = match entry.split_once('=') {
                Some((key, value)) => (key, value),
                None => (entry.as_str(), ""),
            };
            let name = match key.strip_prefix(prefix) {
                Some(name) if !name.is_empty() => varname(name),
                _ => {
                    rest.push(entry);
                    continue;
                }
            };
            let Some(pos) = self.lookup(self.depth, &name) else {
                rest.push(entry);
                continue;
            };
            if self.slot(pos).source == Source::Argv {
                debug!(key, flag = name.as_str(), "env ignored, flag set on command line");
                rest.push(entry);
                continue;
            }

            trace!(key, token = format!("--{name}={value}").as_str(), "env");
            let saved = std::mem::replace(&mut self.source, Source::Env);
            let res = self.apply(pos, Some(value.to_string()));
            self.source = saved;
            res.map_err(|err| err.at(key.to_string()))?;
        }
        Ok(rest)
    }

    /// Overlay `entries` on the command being parsed. Entries no flag
    /// claims stay visible through [`Scope::lookup_env`](crate::Scope::lookup_env).
    pub fn overlay_env<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let rest = self.overlay(entries.into_iter().collect())?;
        self.env.extend(rest);
        Ok(())
    }

    /// Run the overlay over the still unconsumed environment, on entering a node.
    pub(crate) fn overlay_env_here(&mut self) -> Result<()> {
        let env = std::mem::take(&mut self.env);
        self.env = self.overlay(env)?;
        Ok(())
    }
}

/// `LOG_LEVEL` -> `log-level`.
pub(crate) fn varname(key: &str) -> String {
    key.to_lowercase().replace('_', "-")
}
