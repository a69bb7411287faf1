//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration through the [`Context`]
//! 2. Wires the session pieces it needs with [`Context::session`]
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands that talk to the identity provider or the API are async. The
//! dispatch function owns a tokio runtime and blocks on them.

mod completion;
mod config_cmd;
mod login;
mod logout;
mod request;
mod status;

pub use completion::completion;
pub use config_cmd::{path as config_path, show as config_show};
pub use login::login;
pub use logout::logout;
pub use request::request;
pub use status::{status, whoami};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::auth::{ConsoleNavigator, IdentityProvider, Navigator, OidcProvider, TokenHolder};
use crate::cli::args::{Command, ConfigAction};
use crate::config::Config;
use crate::store::{self, SessionStore};
use crate::ui::output::Verbosity;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config_path.as_deref()).context("Failed to load configuration")
    }

    /// Wire the OIDC provider and a token holder over the configured store.
    pub fn session(&self, navigator: Arc<dyn Navigator>) -> Result<SessionParts> {
        let config = self.load_config()?;
        let settings = config
            .auth_settings()
            .context("Identity provider is not configured")?;
        let store: Arc<dyn SessionStore> = Arc::from(
            store::create_store(config.store_provider())
                .context("Failed to initialize session store")?,
        );

        let provider = Arc::new(
            OidcProvider::new(settings, store.clone())
                .context("Failed to create identity provider client")?,
        );
        let idp: Arc<dyn IdentityProvider> = provider.clone();
        let holder = Arc::new(TokenHolder::new(idp, store, navigator));

        Ok(SessionParts {
            config,
            provider,
            holder,
        })
    }

    /// [`session`](Self::session) with the console navigator.
    pub fn console_session(&self) -> Result<SessionParts> {
        self.session(Arc::new(ConsoleNavigator))
    }
}

/// A wired session: configuration, provider and holder.
pub struct SessionParts {
    pub config: Config,
    pub provider: Arc<OidcProvider>,
    pub holder: Arc<TokenHolder>,
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Completion { shell } => completion(shell),
        Command::Config { action } => match action {
            ConfigAction::Path => config_path(ctx),
            ConfigAction::Show => config_show(ctx),
        },
        command => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(dispatch_async(command, ctx))
        }
    }
}

async fn dispatch_async(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Login {
            no_browser,
            return_to,
        } => login(ctx, no_browser, return_to.as_deref()).await,
        Command::Logout => logout(ctx).await,
        Command::Status { json } => status(ctx, json).await,
        Command::Whoami { profile, json } => whoami(ctx, profile, json).await,
        Command::Request {
            method,
            path,
            data,
            raw,
        } => request(ctx, &method, &path, data.as_deref(), raw).await,
        Command::Completion { .. } | Command::Config { .. } => Ok(()),
    }
}
