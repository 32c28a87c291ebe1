use anyhow::Result;
use jukebox_proto::api::{ChangePasswordRequest, LoginRequest, LoginResponse};

use crate::auth;
use crate::client::ApiClient;

/// First-run admin password
pub async fn setup(client: &ApiClient) -> Result<()> {
    let password = auth::prompt_password("Choose a parent password: ")?;
    let confirm = auth::prompt_password("Confirm parent password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let session: LoginResponse = client.post("/auth/setup", &LoginRequest { password }).await?;
    println!("Parent password set.");
    print_session(&session);
    Ok(())
}

pub async fn login(client: &ApiClient) -> Result<()> {
    let password = auth::prompt_password("Enter parent password: ")?;
    let session = auth::login(client, password).await?;
    print_session(&session);
    Ok(())
}

pub async fn logout(client: &ApiClient) -> Result<()> {
    if !client.has_token() {
        anyhow::bail!("No session token given; pass --token or set JUKEBOX_TOKEN");
    }
    client.post_action("/auth/logout", &serde_json::json!({})).await?;
    println!("Logged out.");
    Ok(())
}

pub async fn change_password(client: &mut ApiClient) -> Result<()> {
    let current_password = auth::prompt_password("Current parent password: ")?;
    if !client.has_token() {
        let session = auth::login(client, current_password.clone()).await?;
        client.set_token(session.token);
    }

    let new_password = auth::prompt_password("New parent password: ")?;
    let confirm = auth::prompt_password("Confirm new password: ")?;
    if new_password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    client
        .post_action(
            "/admin/password",
            &ChangePasswordRequest { current_password, new_password },
        )
        .await?;
    println!("Parent password changed. All sessions were signed out.");
    Ok(())
}

fn print_session(session: &LoginResponse) {
    println!("Session token: {}", session.token);
    println!("Expires at:    {}", session.expires_at.with_timezone(&chrono::Local));
    println!();
    println!("Reuse it with: export JUKEBOX_TOKEN={}", session.token);
}
