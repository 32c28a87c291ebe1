use anyhow::{anyhow, Context, Result};
use jukebox_proto::ApiResponse;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_URL: &str = "http://127.0.0.1:5000";

/// Thin REST client for the daemon's `/api` routes
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), token: None })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        required(path, self.send(self.request(Method::GET, path)).await?)
    }

    pub async fn get_query<Q, T>(&self, path: &str, query: &Q) -> Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        required(path, self.send(self.request(Method::GET, path).query(query)).await?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        required(path, self.send(self.request(Method::POST, path).json(body)).await?)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        required(path, self.send(self.request(Method::PUT, path).json(body)).await?)
    }

    /// POST for endpoints that answer with an empty envelope
    pub async fn post_action<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send::<serde_json::Value>(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Option<T>> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to reach the jukebox daemon at {}", self.base_url))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read daemon response")?;
        decode(status.as_u16(), &body)
    }
}

/// Unwrap the `{success, data, error}` envelope
fn decode<T: DeserializeOwned>(status: u16, body: &str) -> Result<Option<T>> {
    let envelope: ApiResponse<T> = serde_json::from_str(body)
        .with_context(|| format!("Unexpected response from daemon (HTTP {})", status))?;

    envelope.into_result().map_err(|message| match status {
        401 => anyhow!("{} (log in with `jukebox-ctl login` or pass --token)", message),
        _ => anyhow!(message),
    })
}

fn required<T>(path: &str, data: Option<T>) -> Result<T> {
    data.ok_or_else(|| anyhow!("Daemon returned no data for {}", path))
}
