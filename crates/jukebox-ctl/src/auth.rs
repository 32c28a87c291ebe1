use anyhow::{Context, Result};
use jukebox_proto::api::{LoginRequest, LoginResponse};

use crate::client::ApiClient;

/// Prompt for the parent password without echoing it
pub fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;

    if password.trim().is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    Ok(password)
}

/// Exchange the parent password for a session token
pub async fn login(client: &ApiClient, password: String) -> Result<LoginResponse> {
    client
        .post("/auth/login", &LoginRequest { password })
        .await
        .context("Failed to authenticate with daemon")
}

/// Make sure `client` carries an admin token, prompting for the password when
/// none was passed with `--token` or `JUKEBOX_TOKEN`
pub async fn require_auth(client: &mut ApiClient) -> Result<()> {
    if client.has_token() {
        return Ok(());
    }

    let password = prompt_password("Enter parent password: ")?;
    let session = login(client, password).await?;
    client.set_token(session.token);
    Ok(())
}
