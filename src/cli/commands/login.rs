//! login command - Interactive OIDC sign-in
//!
//! # Security
//!
//! Tokens are never printed. Only the subject and display name are shown.

use std::sync::Arc;

use super::Context;
use crate::auth::NoopNavigator;
use crate::ui::output;
use anyhow::{Context as _, Result};
use tracing::debug;

/// Run the login command.
pub async fn login(ctx: &Context, no_browser: bool, return_to: Option<&str>) -> Result<()> {
    let parts = ctx.session(Arc::new(NoopNavigator))?;
    let verbosity = ctx.verbosity();

    if let Some(target) = return_to {
        parts
            .holder
            .remember_redirect(target)
            .context("Failed to remember the return location")?;
    }

    let result = parts
        .provider
        .sign_in(|url| {
            output::print("Opening the sign-in page. If nothing happens, visit:", verbosity);
            println!("  {}", url);
            if !no_browser {
                if let Err(e) = open::that(url.as_str()) {
                    debug!(error = %e, "could not open browser");
                }
            }
            output::print("Waiting for the identity provider...", verbosity);
        })
        .await
        .context("Sign-in failed")?;

    let signed_in = parts
        .holder
        .complete_sign_in(result)
        .await
        .context("Sign-in failed")?;

    let name = signed_in.session.display_name().unwrap_or("unknown user");
    output::print(format!("Signed in as {}.", name), verbosity);
    if let Some(redirect) = signed_in.redirect {
        output::print(format!("Continue at: {}", redirect), verbosity);
    }
    Ok(())
}
