//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this configuration file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aula - session and API client for the academic back-office
#[derive(Parser, Debug)]
#[command(name = "aula")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this configuration file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with the identity provider
    #[command(
        name = "login",
        long_about = "Sign in with the identity provider.\n\n\
            Aula uses the OIDC authorization-code flow with PKCE. A local listener \
            receives the provider's redirect on the configured loopback URL, and the \
            resulting tokens are kept in the session store.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Sign in (opens browser automatically)
    aula login

    # Print the sign-in URL instead of opening a browser
    aula login --no-browser

    # Remember where to continue after signing in
    aula login --return-to /students

HOW IT WORKS:
    1. Aula listens on the redirect URL (default http://127.0.0.1:8765/callback)
    2. Your browser opens the identity provider's sign-in page
    3. After you sign in, the provider redirects back to Aula
    4. Aula exchanges the code for tokens and stores them"
    )]
    Login {
        /// Do not attempt to open browser automatically
        #[arg(long)]
        no_browser: bool,

        /// Where to continue after signing in
        #[arg(long, value_name = "URL")]
        return_to: Option<String>,
    },

    /// Sign out and revoke stored tokens
    #[command(
        name = "logout",
        long_about = "Sign out.\n\n\
            Revokes the stored tokens when the identity provider supports it and \
            removes them from the session store. Signing out twice is harmless."
    )]
    Logout,

    /// Show whether a session exists
    #[command(
        name = "status",
        after_help = "\
WORKFLOW EXAMPLES:
    # Human-readable status
    aula status

    # For scripts: prints 'authenticated' or 'not_authenticated'
    aula status -q"
    )]
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the signed-in user
    #[command(name = "whoami")]
    Whoami {
        /// Refresh profile data from the identity provider
        #[arg(long)]
        profile: bool,

        /// Print the user as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send an authenticated request to the API
    #[command(
        name = "request",
        long_about = "Send a request to the back-office API.\n\n\
            Paths are resolved against api.base_url. Requests to protected routes \
            carry the session's bearer token. A 401 or 403 triggers one session \
            refresh and one retry; if that fails too, the session ends.",
        after_help = "\
WORKFLOW EXAMPLES:
    # List students
    aula request GET students

    # Create a cycle
    aula request POST cycles --data '{\"name\": \"2026\"}'"
    )]
    Request {
        /// HTTP method
        method: String,

        /// Path relative to api.base_url, or an absolute URL
        path: String,

        /// JSON request body
        #[arg(long, value_name = "JSON")]
        data: Option<String>,

        /// Print the response body as received
        #[arg(long)]
        raw: bool,
    },

    /// Inspect configuration
    #[command(
        name = "config",
        after_help = "\
WORKFLOW EXAMPLES:
    # Which file is in use
    aula config path

    # Effective values after defaults
    aula config show"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for Aula commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    aula completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    aula completion zsh >> ~/.zshrc

    # Fish
    aula completion fish > ~/.config/fish/completions/aula.fish

    # PowerShell
    aula completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print effective configuration values
    Show,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
