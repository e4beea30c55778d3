// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use llmnav_app::{
    Link, LinkChanges, LinkFieldUpdate, LinkId, NewLink, NewPrompt, Profile, ProfileChanges,
    Prompt, PromptChanges, PromptId, PromptQuery, Session, User, UserId,
};
use std::env;
use std::fs;
use std::path::PathBuf;

mod access;
mod auth;
mod cache;
mod client;
mod memory;
mod query;
mod rows;

pub use access::{BulkDeleteReport, DataAccess, SaveOutcome};
pub use auth::{AuthError, SessionFile};
pub use cache::{
    CachedList, Entity, FetchTicket, LINK_STALE_TIME, PROMPT_STALE_TIME, QueryCache, QueryKey,
};
pub use client::Client;
pub use memory::{DEMO_PASSWORD, DEMO_USERNAME, MemoryStore};
pub use query::{array_literal, filter_value, prompt_query_params};

pub const APP_NAME: &str = "llmnav";

/// Row access against the remote store. Every call is scoped to the caller
/// identified by the access token.
pub trait RemoteStore {
    fn set_access_token(&mut self, access_token: Option<&str>);

    fn list_links(&self) -> Result<Vec<Link>>;
    fn insert_link(&mut self, link: &NewLink) -> Result<Link>;
    fn update_link(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link>;
    fn replace_link(&mut self, id: &LinkId, changes: &LinkChanges) -> Result<Link>;
    fn delete_link(&mut self, id: &LinkId) -> Result<()>;

    fn list_prompts(&self, query: &PromptQuery) -> Result<Vec<Prompt>>;
    /// Detached handle for listing prompts on a worker thread. `None` keeps
    /// prompt reads inline.
    fn prompt_reader(&self) -> Option<Box<dyn PromptReader>> {
        None
    }
    fn insert_prompt(&mut self, prompt: &NewPrompt) -> Result<Prompt>;
    fn update_prompt(&mut self, id: &PromptId, changes: &PromptChanges) -> Result<Prompt>;
    fn delete_prompt(&mut self, id: &PromptId) -> Result<()>;

    /// `None` when the user has no profile row yet.
    fn fetch_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;
    fn update_profile(&mut self, user_id: &UserId, changes: &ProfileChanges) -> Result<Profile>;
    fn username_available(&self, username: &str) -> Result<bool>;
}

/// Prompt listing that owns everything it needs, so it can move to another
/// thread while the store stays with the UI.
pub trait PromptReader: Send {
    fn read_prompts(&self, query: &PromptQuery) -> Result<Vec<Prompt>>;
}

pub trait AuthService {
    /// `None` when the account still needs email confirmation.
    fn sign_up(&mut self, email: &str, password: &str, username: &str) -> Result<Option<Session>>;
    fn sign_in(&mut self, username: &str, password: &str) -> Result<Session>;
    fn sign_out(&mut self, session: &Session) -> Result<()>;
    fn current_user(&self, access_token: &str) -> Result<User>;
}

pub fn default_session_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("LLMNAV_SESSION_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set LLMNAV_SESSION_PATH to a writable file path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("session.json"))
}

pub fn default_log_dir() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set [log].dir in config")
    })?;
    Ok(data_root.join(APP_NAME).join("logs"))
}

/// Store message of a remote failure, without the status prefix.
pub fn remote_message(error: &anyhow::Error) -> String {
    let message = error.to_string();
    match message.split_once("): ") {
        Some((prefix, detail)) if prefix.starts_with("server error (") => detail.to_owned(),
        _ => message,
    }
}
