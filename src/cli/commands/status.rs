//! status and whoami commands
//!
//! Neither command ever prints a token.

use std::sync::Arc;

use serde::Serialize;

use super::Context;
use crate::auth::{InitOutcome, NoopNavigator, Session, SessionUser};
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Result};

const WIDTH: usize = 12;

#[derive(Serialize)]
struct StatusReport<'a> {
    authenticated: bool,
    authority: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a SessionUser>,
}

/// Show whether a session exists.
pub async fn status(ctx: &Context, json: bool) -> Result<()> {
    let parts = ctx.session(Arc::new(NoopNavigator))?;
    let outcome = parts.holder.initialize().await;
    if let InitOutcome::Failed(e) = &outcome {
        output::warn(format!("session check failed: {}", e), ctx.verbosity());
    }
    let session = parts.holder.session();

    if json {
        output::json(&StatusReport {
            authenticated: session.is_authenticated(),
            authority: parts.holder.authority(),
            user: session.user(),
        })?;
        return Ok(());
    }

    if ctx.quiet {
        // Machine-readable output
        if session.is_authenticated() {
            println!("authenticated");
        } else {
            println!("not_authenticated");
        }
    } else if session.is_authenticated() {
        println!(
            "Signed in to {} as {}.",
            parts.holder.authority(),
            session.display_name().unwrap_or_default()
        );
    } else {
        println!("Not signed in to {}.", parts.holder.authority());
        println!("Run 'aula login' to sign in.");
    }
    Ok(())
}

/// Show the signed-in user.
pub async fn whoami(ctx: &Context, profile: bool, json: bool) -> Result<()> {
    let parts = ctx.session(Arc::new(NoopNavigator))?;
    parts.holder.initialize().await;
    if !parts.holder.is_authenticated() {
        bail!("Not signed in. Run 'aula login' first.");
    }

    if profile {
        if let Err(e) = parts.holder.load_profile().await {
            output::warn(format!("could not load profile: {}", e), ctx.verbosity());
        }
    }

    let session = parts.holder.session();
    let Some(user) = session.user() else {
        bail!("Not signed in. Run 'aula login' first.");
    };
    if json {
        output::json(user)?;
        return Ok(());
    }
    print_user(&session, user, ctx.verbosity());
    Ok(())
}

fn print_user(session: &Session, user: &SessionUser, verbosity: Verbosity) {
    if verbosity == Verbosity::Quiet {
        println!("{}", user.subject);
        return;
    }
    println!("{}", output::field("name", &user.display_name, WIDTH));
    println!("{}", output::field("email", &user.email, WIDTH));
    println!("{}", output::field("subject", &user.subject, WIDTH));
    let roles = if session.roles().is_empty() {
        "(none)".to_string()
    } else {
        session.roles().join(", ")
    };
    println!("{}", output::field("roles", roles, WIDTH));
    if let Some(avatar) = &user.avatar_url {
        println!("{}", output::field("avatar", avatar, WIDTH));
    }
}
