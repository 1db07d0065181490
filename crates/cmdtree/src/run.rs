//! Lifecycle runner: resolve, check mandatory flags, then `Before` hooks
//! root to leaf, the leaf's `Action`, and `After` hooks leaf to root.

use std::io::{self, Write};

use tracing::debug;

use crate::command::App;
use crate::complete::{CompletionRequest, run_completion};
use crate::context::Context;
use crate::error::{Error, Result};

impl App {
    /// Run one invocation. `argv[0]` is the program name; `env` holds
    /// `KEY=VALUE` entries. Completion replies go to standard output.
    pub fn run<A, E>(&self, argv: A, env: E) -> Result<()>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let mut stdout = io::stdout().lock();
        self.run_with_output(argv, env, &mut stdout)
    }

    /// Like [`run`](Self::run) with an explicit output sink.
    pub fn run_with_output<A, E>(&self, argv: A, env: E, out: &mut dyn Write) -> Result<()>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let env: Vec<String> = env.into_iter().map(Into::into).collect();
        let request = CompletionRequest::from_env(&env);

        let mut ctx = Context::new(&self.root, argv, env, Box::new(out));
        let res = match request {
            Some(req) => run_completion(&mut ctx, &req),
            None => lifecycle(&mut ctx),
        };
        let flushed = ctx.stdout().flush().map_err(Error::Output);

        match res.and(flushed) {
            Err(err) if err.is_exit() => {
                debug!("exit requested");
                Ok(())
            }
            res => res,
        }
    }
}

/// Run `app` with the given argv and environment, writing to standard output.
pub fn run<A, E>(app: &App, argv: A, env: E) -> Result<()>
where
    A: IntoIterator,
    A::Item: Into<String>,
    E: IntoIterator,
    E::Item: Into<String>,
{
    app.run(argv, env)
}

fn lifecycle(ctx: &mut Context<'_>) -> Result<()> {
    ctx.resolve()?;
    ctx.check_flags()?;

    let leaf = ctx.depth;
    let mut entered = 0;
    let mut res = Ok(());
    for depth in 0..=leaf {
        let scope = ctx.scope_at(depth);
        if let Some(before) = &scope.command().before {
            if let Err(err) = before(&scope) {
                res = Err(ctx.breadcrumbs(err, depth));
                break;
            }
        }
        entered = depth + 1;
    }

    if res.is_ok() {
        res = action(ctx).map_err(|err| ctx.breadcrumbs(err, leaf));
    }

    for depth in (0..entered).rev() {
        let scope = ctx.scope_at(depth);
        if let Some(after) = &scope.command().after {
            if let Err(err) = after(&scope) {
                let err = ctx.breadcrumbs(err, depth);
                if res.is_ok() {
                    res = Err(err);
                } else {
                    debug!(error = %err, "after hook failed, keeping earlier error");
                }
            }
        }
    }
    res
}

fn action(ctx: &Context<'_>) -> Result<()> {
    let scope = ctx.scope();
    let cmd = scope.command();
    debug!(command = ?scope.path(), "dispatch");
    match &cmd.action {
        Some(action) => action(&scope),
        None if !cmd.commands.is_empty() => Err(Error::NoSuchCommand("(missing)".to_string())),
        None => Ok(()),
    }
}
