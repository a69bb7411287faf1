//! request command - Send one API request through the session

use std::sync::Arc;

use reqwest::Method;

use super::Context;
use crate::auth::{ConsoleNavigator, TokenSource};
use crate::http::{ApiClient, ApiRequest, ConsoleNotifier};
use anyhow::{Context as _, Result};

/// Run the request command.
pub async fn request(
    ctx: &Context,
    method: &str,
    path: &str,
    data: Option<&str>,
    raw: bool,
) -> Result<()> {
    let method = parse_method(method)?;
    let parts = ctx.session(Arc::new(ConsoleNavigator))?;
    let api = parts
        .config
        .api_settings()
        .context("API is not configured")?;
    let auth = parts.provider.settings().clone();

    // A missing session is not an error here: the server decides.
    parts.holder.initialize().await;

    let tokens: Arc<dyn TokenSource> = parts.holder.clone();
    let client = ApiClient::from_settings(
        &api,
        &auth,
        parts.config.environment(),
        tokens,
        Arc::new(ConsoleNotifier::new(ctx.verbosity())),
    )
    .context("Failed to create API client")?;

    let mut request = ApiRequest::new(method, client.resolve(path)?);
    if let Some(body) = data {
        let value: serde_json::Value =
            serde_json::from_str(body).context("--data is not valid JSON")?;
        request = request.with_json(&value)?;
    }

    let response = client.send(request).await?;
    if raw {
        print!("{}", response.text());
        return Ok(());
    }
    match response.json::<serde_json::Value>() {
        Ok(serde_json::Value::Null) => {}
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("'{}' is not an HTTP method", method))
}
