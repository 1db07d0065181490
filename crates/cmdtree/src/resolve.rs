//! Command resolution: walks the token stream from the root down to the
//! chosen leaf, consuming flags on the way.

use tracing::{debug, trace};

use crate::command::Command;
use crate::context::{Context, FlagPos, Frame, Slot, Source};
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::token::{Token, classify, split_flag};
use crate::value::Value;

impl<'a> Context<'a> {
    /// Consume the remaining tokens. On success the last frame is the leaf.
    ///
    /// Errors carry the path of commands entered so far, root first.
    pub(crate) fn resolve(&mut self) -> Result<()> {
        debug!(command = self.command().main_name(), "enter");
        let res = self.overlay_env_here().and_then(|()| self.consume_tokens());
        res.map_err(|err| self.breadcrumbs(err, self.depth))
    }

    fn consume_tokens(&mut self) -> Result<()> {
        while let Some(token) = self.rest.pop_front() {
            trace!(token = token.as_str(), command = self.command().main_name(), "token");
            match classify(&token, self.after_terminator) {
                Token::Terminator => self.after_terminator = true,
                Token::Long => self.parse_flag_token(&token)?,
                Token::Short => self.parse_short_token(&token)?,
                Token::Positional => self.positional(token)?,
            }
            if self.pending.is_some() {
                break;
            }
        }
        Ok(())
    }

    /// Wrap `err` with the command names from `depth` up to the root.
    pub(crate) fn breadcrumbs(&self, err: Error, depth: usize) -> Error {
        self.path(depth)
            .into_iter()
            .rev()
            .fold(err, |err, name| err.at(name))
    }

    fn positional(&mut self, token: String) -> Result<()> {
        let cmd = self.command();
        let after = self.after_terminator;
        let frame = &self.frames[self.depth];
        let committed = frame.args.as_ref().is_some_and(|args| !args.is_empty());

        if !after && !committed {
            if let Some(sub) = cmd.subcommand(&token) {
                return self.enter(sub);
            }
        }

        match &mut self.frames[self.depth].args {
            Some(args) => {
                args.push(token);
                Ok(())
            }
            None if !cmd.commands.is_empty() && !after => {
                Err(Error::NoSuchCommand(token))
            }
            None => Err(Error::NoArgumentsExpected(token)),
        }
    }

    fn enter(&mut self, sub: &'a Command) -> Result<()> {
        debug!(
            parent = self.command().main_name(),
            command = sub.main_name(),
            "enter"
        );
        self.frames.push(Frame::new(sub));
        self.depth = self.frames.len() - 1;
        self.overlay_env_here()
    }

    /// `--name`, `--name=value`, `-name=value`.
    fn parse_flag_token(&mut self, token: &str) -> Result<()> {
        let ft = split_flag(token);
        let shown = format!("{}{}", &token[..ft.dashes], ft.name);
        let pos = self
            .lookup(self.depth, ft.name)
            .ok_or_else(|| Error::NoSuchFlag(shown.clone()))?;
        self.apply(pos, ft.value.map(str::to_string))
            .map_err(|err| err.at(shown))
    }

    /// A single-dash token naming a flag as a whole (`-f`, `-f6=9`), or else
    /// a cluster of one-character flags (`-vq`, `-vofile`).
    fn parse_short_token(&mut self, token: &str) -> Result<()> {
        let ft = split_flag(token);
        if ft.name.chars().count() <= 1 || self.lookup(self.depth, ft.name).is_some() {
            return self.parse_flag_token(token);
        }

        let body = &token[1..];
        for (i, c) in body.char_indices() {
            let name = &body[i..i + c.len_utf8()];
            let remainder = &body[i + c.len_utf8()..];
            let shown = format!("-{name}");
            let pos = self
                .lookup(self.depth, name)
                .ok_or_else(|| Error::NoSuchFlag(shown.clone()))?;

            if self.flag_at(pos).takes_value() {
                let inline = (!remainder.is_empty())
                    .then(|| remainder.strip_prefix('=').unwrap_or(remainder).to_string());
                return self.apply(pos, inline).map_err(|err| err.at(shown));
            }
            if let Some(value) = remainder.strip_prefix('=') {
                return self
                    .apply(pos, Some(value.to_string()))
                    .map_err(|err| err.at(shown));
            }
            self.apply(pos, None).map_err(|err| err.at(shown))?;
        }
        Ok(())
    }

    /// Parse one occurrence of the flag at `pos`, taking its value from
    /// `inline` or, for value-taking kinds, from the next token. Flags with
    /// an optional value fall back to their bare value instead.
    pub(crate) fn apply(&mut self, pos: FlagPos, inline: Option<String>) -> Result<()> {
        let flag = self.flag_at(pos);
        let hooks = !self.is_completing();

        if hooks {
            if let Some(before) = &flag.before {
                before(self, flag)?;
            }
        }

        let raw = match inline {
            Some(value) => value,
            None if flag.takes_value() => match self.rest.pop_front() {
                Some(value) => value,
                None if self.is_completing() => {
                    self.pending = Some(pos);
                    return Ok(());
                }
                None => return Err(Error::ValueRequired),
            },
            None => flag.bare.clone().unwrap_or_default(),
        };
        let raw = if flag.at_file {
            crate::file::expand_at_file(&raw)?
        } else {
            raw
        };

        let value = flag
            .kind
            .parse(&raw)
            .map_err(|reason| Error::invalid(&raw, reason))?;
        let source = self.source;
        store(self.slot_mut(pos), value, source);
        trace!(flag = flag.main_name(), ?source, "set");

        if hooks {
            if let Some(after) = &flag.after {
                after(self, flag)?;
            }
        }
        Ok(())
    }

    /// Validate every flag on the resolved chain: its check hook when it
    /// has one, else the required test.
    pub(crate) fn check_flags(&self) -> Result<()> {
        for (depth, frame) in self.frames.iter().enumerate() {
            for index in 0..frame.slots.len() {
                let pos = FlagPos { depth, index };
                let flag = self.flag_at(pos);
                let res = match &flag.check {
                    Some(check) => check(self.flag_ref(pos)),
                    None if flag.is_required() && !self.slot(pos).is_set() => {
                        Err(Error::FlagMandatory)
                    }
                    None => Ok(()),
                };
                if let Err(err) = res {
                    let err = err.at(crate::flag::dashed(flag.main_name()));
                    return Err(self.breadcrumbs(err, depth));
                }
            }
        }
        Ok(())
    }
}

/// Lists accumulate; the first value from a higher-precedence source drops
/// what lower sources left there. Everything else is replaced.
fn store(slot: &mut Slot, value: Value, source: Source) {
    match (value, &mut slot.value) {
        (Value::List(new), Value::List(list)) => {
            if slot.source < source {
                list.clear();
            }
            list.extend(new);
        }
        (value, current) => *current = value,
    }
    slot.source = source;
}

/// The flag a value-less token at the end of a completion line is waiting on.
pub(crate) fn pending_flag<'a>(ctx: &Context<'a>) -> Option<&'a Flag> {
    ctx.pending.map(|pos| ctx.flag_at(pos))
}
