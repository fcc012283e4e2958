use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Serialize;
use url::Url;

use crate::post::Post;

const REST_PREFIX: &str = "rest/v1/";
const RANDOM_POSTS_RPC: &str = "rpc/get_random_posts";
const POSTS_TABLE: &str = "posts";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Blocking client for the PostgREST endpoints that back the feed.
pub struct Client {
    http: HttpClient,
    api_key: String,
    user_agent: String,
    rest_base: Url,
}

#[derive(Serialize)]
struct RandomPostsArgs<'a> {
    exclude_ids: &'a [String],
    limit_size: usize,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("remote: base url required");
        }
        if config.api_key.trim().is_empty() {
            bail!("remote: api key required");
        }
        if config.user_agent.trim().is_empty() {
            bail!("remote: user agent required");
        }

        let rest_base = rest_base(&config.base_url)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("remote: build http client")?,
        };

        Ok(Client {
            http,
            api_key: config.api_key,
            user_agent: config.user_agent,
            rest_base,
        })
    }

    /// Server-side random selection of up to `limit` posts whose id is not in
    /// `exclude_ids`.
    pub fn random_posts(&self, limit: usize, exclude_ids: &[String]) -> Result<Vec<Post>> {
        let url = self
            .rest_base
            .join(RANDOM_POSTS_RPC)
            .context("remote: build rpc url")?;
        let body = RandomPostsArgs {
            exclude_ids,
            limit_size: limit,
        };
        let response = self
            .authorized(self.http.post(url))
            .json(&body)
            .send()
            .context("remote: call get_random_posts")?;
        decode_rows(response, "get_random_posts")
    }

    /// Newest-first page of a user's posts, `page` counted from zero.
    pub fn user_posts(
        &self,
        page: usize,
        page_size: usize,
        user_id: &str,
        private_only: Option<bool>,
    ) -> Result<Vec<Post>> {
        let url = user_posts_url(&self.rest_base, page, page_size, user_id, private_only)?;
        let response = self
            .authorized(self.http.get(url))
            .send()
            .context("remote: list user posts")?;
        decode_rows(response, "posts")
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_AGENT, &self.user_agent)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }
}

fn rest_base(base_url: &str) -> Result<Url> {
    let mut raw = base_url.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let base = Url::parse(&raw).with_context(|| format!("remote: invalid base url {base_url}"))?;
    base.join(REST_PREFIX)
        .context("remote: build rest base url")
}

fn user_posts_url(
    rest_base: &Url,
    page: usize,
    page_size: usize,
    user_id: &str,
    private_only: Option<bool>,
) -> Result<Url> {
    let mut url = rest_base
        .join(POSTS_TABLE)
        .context("remote: build posts url")?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("select", "*")
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("order", "created_at.desc")
            .append_pair("offset", &page.saturating_mul(page_size).to_string())
            .append_pair("limit", &page_size.to_string());
        if let Some(private) = private_only {
            query.append_pair("private", &format!("eq.{private}"));
        }
    }
    Ok(url)
}

fn decode_rows(response: reqwest::blocking::Response, what: &str) -> Result<Vec<Post>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        bail!("remote: {what} failed: {status} - {body}");
    }
    response
        .json::<Vec<Post>>()
        .with_context(|| format!("remote: decode {what} rows"))
}
