//! logout command - End the session

use std::sync::Arc;

use super::Context;
use crate::auth::NoopNavigator;
use crate::ui::output;
use anyhow::Result;
use tracing::debug;

/// Run the logout command. Succeeds when no session exists.
pub async fn logout(ctx: &Context) -> Result<()> {
    let parts = ctx.session(Arc::new(NoopNavigator))?;
    let verbosity = ctx.verbosity();

    // The end-session URL needs the id token, so build it before revoking.
    let end_session = match parts.provider.stored_bundle() {
        Ok(Some(_)) => match parts.provider.end_session_url().await {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "no end-session URL");
                None
            }
        },
        _ => None,
    };

    parts.holder.logout().await;

    output::print("Signed out.", verbosity);
    if let Some(url) = end_session {
        output::print(
            format!("To end the browser session as well, visit:\n  {}", url),
            verbosity,
        );
    }
    Ok(())
}
