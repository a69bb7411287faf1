//! config command - Show the configuration file and effective values

use super::Context;
use crate::config::Config;
use crate::ui::output;
use anyhow::Result;

const WIDTH: usize = 30;

/// Print the configuration file in use, or where one would be read from.
pub fn path(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    match config.loaded_from() {
        Some(path) => println!("{}", path.display()),
        None => {
            let default = Config::default_path()?;
            println!("{}", default.display());
            if !ctx.quiet {
                output::hint("(file does not exist; defaults are in effect)");
            }
        }
    }
    Ok(())
}

/// Print effective configuration values.
pub fn show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;

    println!("{}", output::field("environment", config.environment(), WIDTH));

    println!("\n[auth]");
    match config.auth_settings() {
        Ok(auth) => {
            println!("{}", output::field("authority", &auth.authority, WIDTH));
            println!("{}", output::field("client_id", &auth.client_id, WIDTH));
            println!("{}", output::field("redirect_url", &auth.redirect_url, WIDTH));
            let post_logout = auth
                .post_logout_redirect_url
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "(not set)".to_string());
            println!(
                "{}",
                output::field("post_logout_redirect_url", post_logout, WIDTH)
            );
            println!("{}", output::field("scopes", &auth.scopes, WIDTH));
            println!("{}", output::field("silent_renew", auth.silent_renew, WIDTH));
            println!(
                "{}",
                output::field("use_refresh_tokens", auth.use_refresh_tokens, WIDTH)
            );
        }
        Err(e) => println!("# {}", e),
    }

    println!("\n[api]");
    match config.api_settings() {
        Ok(api) => {
            println!("{}", output::field("base_url", &api.base_url, WIDTH));
            println!("{}", output::field("timeout_secs", api.timeout.as_secs(), WIDTH));
            println!("protected_routes:");
            println!("{}", output::format_list(&api.protected_routes, "  - "));
        }
        Err(e) => println!("# {}", e),
    }

    println!("\n[store]");
    println!("{}", output::field("provider", config.store_provider(), WIDTH));

    Ok(())
}
