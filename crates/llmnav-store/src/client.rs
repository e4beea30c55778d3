// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use llmnav_app::{
    Link, LinkChanges, LinkFieldUpdate, LinkId, NewLink, NewPrompt, Profile, ProfileChanges,
    Prompt, PromptChanges, PromptId, PromptQuery, Session, User, UserId,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::query::{eq_param, link_list_params, prompt_query_params};
use crate::rows::{
    LinkRow, NewLinkRow, ProfileRow, PromptRow, TokenResponse, UserRow, link_changes_body,
    link_update_body, new_prompt_body, prompt_changes_body,
};
use crate::{AuthError, AuthService, PromptReader, RemoteStore, remote_message};

const LINKS_TABLE: &str = "llm_links";
const PROMPTS_TABLE: &str = "prompts";
const PROFILES_TABLE: &str = "profiles";

/// HTTP client for the hosted backend: PostgREST under `/rest/v1` and the
/// auth server under `/auth/v1`.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("backend.url must not be empty -- set [backend].url in config or LLMNAV_BACKEND_URL");
        }
        url::Url::parse(&base_url).with_context(|| {
            format!("backend.url {base_url:?} is not a valid URL -- use e.g. https://<project>.supabase.co")
        })?;
        if anon_key.trim().is_empty() {
            bail!("backend.anon_key must not be empty -- set [backend].anon_key in config or LLMNAV_ANON_KEY");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            anon_key: anon_key.trim().to_owned(),
            access_token: None,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reachability check used by `--check`: the auth server health route.
    pub fn ping(&self) -> Result<()> {
        let response = self.request(Method::GET, &self.auth_url("health"));
        self.send(response, "health")?;
        Ok(())
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn request_as(&self, method: Method, url: &str, access_token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let status = response.status();
        debug!(what, status = status.as_u16(), "backend response");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)?
            .json()
            .with_context(|| format!("decode {what} response"))
    }

    /// First row of a `return=representation` response.
    fn single_row<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let rows: Vec<T> = self.send_json(
            request.header("Prefer", "return=representation"),
            what,
        )?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("{what} returned no row -- it may have been deleted; refresh and retry"))
    }
}

/// A cloned client carries the caller's token, so the read runs with the
/// same row-level scope as the original.
impl PromptReader for Client {
    fn read_prompts(&self, query: &PromptQuery) -> Result<Vec<Prompt>> {
        RemoteStore::list_prompts(self, query)
    }
}

impl RemoteStore for Client {
    fn set_access_token(&mut self, access_token: Option<&str>) {
        self.access_token = access_token.map(str::to_owned);
    }

    fn list_links(&self) -> Result<Vec<Link>> {
        let request = self
            .request(Method::GET, &self.rest_url(LINKS_TABLE))
            .query(&link_list_params());
        let rows: Vec<LinkRow> = self.send_json(request, "list links")?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    fn insert_link(&mut self, link: &NewLink) -> Result<Link> {
        let request = self
            .request(Method::POST, &self.rest_url(LINKS_TABLE))
            .json(&[NewLinkRow::from(link)]);
        let row: LinkRow = self.single_row(request, "insert link")?;
        Ok(row.into())
    }

    fn update_link(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link> {
        let request = self
            .request(Method::PATCH, &self.rest_url(LINKS_TABLE))
            .query(&[eq_param("id", id.as_str())])
            .json(&link_update_body(update));
        let row: LinkRow = self.single_row(request, "update link")?;
        Ok(row.into())
    }

    fn replace_link(&mut self, id: &LinkId, changes: &LinkChanges) -> Result<Link> {
        let request = self
            .request(Method::PATCH, &self.rest_url(LINKS_TABLE))
            .query(&[eq_param("id", id.as_str())])
            .json(&link_changes_body(changes));
        let row: LinkRow = self.single_row(request, "update link")?;
        Ok(row.into())
    }

    fn delete_link(&mut self, id: &LinkId) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.rest_url(LINKS_TABLE))
            .query(&[eq_param("id", id.as_str())]);
        self.send(request, "delete link")?;
        Ok(())
    }

    fn list_prompts(&self, query: &PromptQuery) -> Result<Vec<Prompt>> {
        let request = self
            .request(Method::GET, &self.rest_url(PROMPTS_TABLE))
            .query(&prompt_query_params(query));
        let rows: Vec<PromptRow> = self.send_json(request, "list prompts")?;
        Ok(rows.into_iter().map(Prompt::from).collect())
    }

    fn prompt_reader(&self) -> Option<Box<dyn PromptReader>> {
        Some(Box::new(self.clone()))
    }

    fn insert_prompt(&mut self, prompt: &NewPrompt) -> Result<Prompt> {
        let request = self
            .request(Method::POST, &self.rest_url(PROMPTS_TABLE))
            .json(&[new_prompt_body(prompt)]);
        let row: PromptRow = self.single_row(request, "insert prompt")?;
        Ok(row.into())
    }

    fn update_prompt(&mut self, id: &PromptId, changes: &PromptChanges) -> Result<Prompt> {
        let updated_at = now_rfc3339()?;
        let request = self
            .request(Method::PATCH, &self.rest_url(PROMPTS_TABLE))
            .query(&[eq_param("id", id.as_str())])
            .json(&prompt_changes_body(changes, &updated_at));
        let row: PromptRow = self.single_row(request, "update prompt")?;
        Ok(row.into())
    }

    fn delete_prompt(&mut self, id: &PromptId) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.rest_url(PROMPTS_TABLE))
            .query(&[eq_param("id", id.as_str())]);
        self.send(request, "delete prompt")?;
        Ok(())
    }

    fn fetch_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let request = self
            .request(Method::GET, &self.rest_url(PROFILES_TABLE))
            .query(&[("select".to_owned(), "*".to_owned()), eq_param("id", user_id.as_str())]);
        let rows: Vec<ProfileRow> = self.send_json(request, "fetch profile")?;
        Ok(rows.into_iter().next().map(Profile::from))
    }

    fn update_profile(&mut self, user_id: &UserId, changes: &ProfileChanges) -> Result<Profile> {
        let request = self
            .request(Method::PATCH, &self.rest_url(PROFILES_TABLE))
            .query(&[eq_param("id", user_id.as_str())])
            .json(&json!({
                "username": changes.username,
                "avatar_url": changes.avatar_url,
                "updated_at": now_rfc3339()?,
            }));
        let row: ProfileRow = self.single_row(request, "update profile")?;
        Ok(row.into())
    }

    fn username_available(&self, username: &str) -> Result<bool> {
        let request = self
            .request(Method::GET, &self.rest_url(PROFILES_TABLE))
            .query(&[
                ("select".to_owned(), "username".to_owned()),
                eq_param("username", username),
            ]);
        let rows: Vec<Value> = self.send_json(request, "check username")?;
        Ok(rows.is_empty())
    }
}

impl AuthService for Client {
    fn sign_up(&mut self, email: &str, password: &str, username: &str) -> Result<Option<Session>> {
        let request = self
            .request(Method::POST, &self.auth_url("signup"))
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }));
        let response: TokenResponse = match self.send_json(request, "sign up") {
            Ok(response) => response,
            Err(error) if is_transport_error(&error) => return Err(error),
            Err(error) => {
                return Err(AuthError::SignUpRejected(remote_message(&error)).into());
            }
        };
        info!("sign-up accepted");
        Ok(response.into_session(OffsetDateTime::now_utc()))
    }

    fn sign_in(&mut self, username: &str, password: &str) -> Result<Session> {
        let lookup = self
            .request(Method::POST, &self.rest_url("rpc/get_email_by_username"))
            .json(&json!({ "p_username": username }));
        let email = match self.send_json::<Option<String>>(lookup, "resolve username") {
            Ok(Some(email)) if !email.is_empty() => email,
            Ok(_) => {
                debug!("username did not resolve");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(error) if is_transport_error(&error) => return Err(error),
            Err(error) => {
                debug!(error = %error, "username lookup rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let grant = self
            .request(Method::POST, &self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let response: TokenResponse = match self.send_json(grant, "sign in") {
            Ok(response) => response,
            Err(error) if is_transport_error(&error) => return Err(error),
            Err(error) => {
                debug!(error = %error, "password grant rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        let session = response
            .into_session(OffsetDateTime::now_utc())
            .ok_or(AuthError::InvalidCredentials)?;
        info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    fn sign_out(&mut self, session: &Session) -> Result<()> {
        let request = self.request_as(
            Method::POST,
            &self.auth_url("logout"),
            &session.access_token,
        );
        let result = self.send(request, "sign out");
        self.access_token = None;
        if let Err(error) = &result {
            warn!(error = %error, "sign-out request failed");
        }
        result.map(|_| ())
    }

    fn current_user(&self, access_token: &str) -> Result<User> {
        let request = self.request_as(Method::GET, &self.auth_url("user"), access_token);
        match self.send_json::<UserRow>(request, "current user") {
            Ok(row) => Ok(row.into()),
            Err(error) if is_transport_error(&error) => Err(error),
            Err(_) => Err(AuthError::NotAuthenticated.into()),
        }
    }
}

/// Marker for errors where the backend was never reached.
#[derive(Debug)]
struct Unreachable;

impl std::fmt::Display for Unreachable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("backend unreachable")
    }
}

impl std::error::Error for Unreachable {}

fn is_transport_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<Unreachable>().is_some()
        || error.chain().any(|cause| cause.is::<Unreachable>())
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow::Error::new(Unreachable).context(format!(
        "cannot reach {base_url} -- check [backend].url and your network ({error})"
    ))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<Value>,
}

impl ErrorEnvelope {
    fn best_message(self) -> Option<String> {
        let error = self.error.and_then(|value| match value {
            Value::String(text) => Some(text),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        });
        [self.message, self.msg, self.error_description, error]
            .into_iter()
            .flatten()
            .find(|message| !message.is_empty())
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.best_message()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}
