// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Wire shapes of the backend tables. Nullable columns decode leniently and
//! are normalized on conversion to domain types.

use llmnav_app::{
    Link, LinkChanges, LinkFieldUpdate, LinkId, NewLink, NewPrompt, Profile, Prompt,
    PromptChanges, PromptId, Session, User, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LinkRow {
    id: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    name: Option<String>,
    description: Option<String>,
    url: Option<String>,
    model: Option<String>,
    category: Option<Vec<String>>,
    #[serde(rename = "isPopular")]
    is_popular: Option<bool>,
    tags: Option<Vec<String>>,
    user_id: Option<String>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Self {
            id: LinkId::new(row.id),
            name: row.name.unwrap_or_default(),
            url: row.url.unwrap_or_default(),
            model: row.model.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            is_popular: row.is_popular.unwrap_or(false),
            created_at: row.created_at,
            user_id: row.user_id.map(UserId::new),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PromptRow {
    id: String,
    user_id: Option<String>,
    title: Option<String>,
    category: Option<Vec<String>>,
    description: Option<String>,
    prompt_text: Option<String>,
    tags: Option<Vec<String>>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl From<PromptRow> for Prompt {
    fn from(row: PromptRow) -> Self {
        Self {
            id: PromptId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            title: row.title.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            description: row.description.filter(|value| !value.is_empty()),
            prompt_text: row.prompt_text.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProfileRow {
    id: String,
    username: Option<String>,
    avatar_url: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: UserId::new(row.id),
            username: row.username.unwrap_or_default(),
            avatar_url: row.avatar_url.filter(|value| !value.is_empty()),
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UserMetadata {
    username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserRow {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            email: row.email.unwrap_or_default(),
            username: row.user_metadata.username,
        }
    }
}

/// Token grant response. Sign-up responds with the same shape when email
/// confirmation is off, or with a bare user when it is on.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<UserRow>,
}

impl TokenResponse {
    pub(crate) fn into_session(self, now: OffsetDateTime) -> Option<Session> {
        let access_token = self.access_token?;
        let user = self.user?;
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|seconds| now.unix_timestamp() + seconds)
        });
        Some(Session {
            access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            expires_at,
            user: user.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewLinkRow<'a> {
    name: &'a str,
    url: &'a str,
    model: &'a str,
    description: &'a str,
    category: &'a [String],
    tags: &'a [String],
    #[serde(rename = "isPopular")]
    is_popular: bool,
    user_id: &'a str,
}

impl<'a> From<&'a NewLink> for NewLinkRow<'a> {
    fn from(link: &'a NewLink) -> Self {
        Self {
            name: &link.name,
            url: &link.url,
            model: &link.model,
            description: &link.description,
            category: &link.category,
            tags: &link.tags,
            is_popular: link.is_popular,
            user_id: link.user_id.as_str(),
        }
    }
}

pub(crate) fn link_changes_body(changes: &LinkChanges) -> Value {
    json!({
        "name": changes.name,
        "url": changes.url,
        "model": changes.model,
        "description": changes.description,
        "category": changes.category,
        "tags": changes.tags,
        "isPopular": changes.is_popular,
    })
}

/// PATCH body carrying only the edited column.
pub(crate) fn link_update_body(update: &LinkFieldUpdate) -> Value {
    let mut body = Map::new();
    let value = match update {
        LinkFieldUpdate::Name(value)
        | LinkFieldUpdate::Url(value)
        | LinkFieldUpdate::Model(value)
        | LinkFieldUpdate::Description(value) => json!(value),
        LinkFieldUpdate::Category(values) | LinkFieldUpdate::Tags(values) => json!(values),
        LinkFieldUpdate::Popular(value) => json!(value),
    };
    body.insert(update.column().as_str().to_owned(), value);
    Value::Object(body)
}

pub(crate) fn new_prompt_body(prompt: &NewPrompt) -> Value {
    json!({
        "user_id": prompt.user_id.as_str(),
        "title": prompt.title,
        "category": prompt.category,
        "description": prompt.description,
        "prompt_text": prompt.prompt_text,
        "tags": prompt.tags,
    })
}

pub(crate) fn prompt_changes_body(changes: &PromptChanges, updated_at: &str) -> Value {
    json!({
        "title": changes.title,
        "category": changes.category,
        "description": changes.description,
        "prompt_text": changes.prompt_text,
        "tags": changes.tags,
        "updated_at": updated_at,
    })
}
