// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

pub const CATEGORY_ALL: &str = "all";
pub const CATEGORY_POPULAR: &str = "popular";

/// Category filter for the links page. `All` and `Popular` never restrict by
/// category; popularity is a separate toggle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CategorySelection {
    All,
    #[default]
    Popular,
    Named(String),
}

impl CategorySelection {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => CATEGORY_ALL,
            Self::Popular => CATEGORY_POPULAR,
            Self::Named(name) => name,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            CATEGORY_ALL => Self::All,
            CATEGORY_POPULAR => Self::Popular,
            other => Self::Named(other.to_owned()),
        }
    }

    pub fn named(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::All | Self::Popular => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Links,
    Table,
    Prompts,
    Profile,
}

impl TabKind {
    pub const ALL: [Self; 4] = [Self::Links, Self::Table, Self::Prompts, Self::Profile];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Table => "table",
            Self::Prompts => "prompts",
            Self::Profile => "profile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "links" => Some(Self::Links),
            "table" => Some(Self::Table),
            "prompts" => Some(Self::Prompts),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Table => "table",
            Self::Prompts => "prompts",
            Self::Profile => "profile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Link,
    Prompt,
    Profile,
    SignIn,
    SignUp,
}

impl FormKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Prompt => "prompt",
            Self::Profile => "profile",
            Self::SignIn => "sign in",
            Self::SignUp => "sign up",
        }
    }

    pub const fn requires_user(self) -> bool {
        matches!(self, Self::Link | Self::Prompt | Self::Profile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Edit,
    Form(FormKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub url: String,
    pub model: String,
    pub description: String,
    pub category: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "isPopular")]
    pub is_popular: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub user_id: Option<UserId>,
    pub title: String,
    pub category: Vec<String>,
    pub description: Option<String>,
    pub prompt_text: String,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Profile {
    pub fn initials(&self) -> String {
        self.username.chars().take(2).collect::<String>().to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.unix_timestamp())
    }
}

/// Row to insert into `llm_links`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLink {
    pub user_id: UserId,
    pub name: String,
    pub url: String,
    pub model: String,
    pub description: String,
    pub category: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "isPopular")]
    pub is_popular: bool,
}

/// Every mutable column of a link, for the edit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkChanges {
    pub name: String,
    pub url: String,
    pub model: String,
    pub description: String,
    pub category: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "isPopular")]
    pub is_popular: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrompt {
    pub user_id: UserId,
    pub title: String,
    pub category: Vec<String>,
    pub description: Option<String>,
    pub prompt_text: String,
    pub tags: Vec<String>,
}

/// Full replacement of a prompt's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptChanges {
    pub title: String,
    pub category: Vec<String>,
    pub description: Option<String>,
    pub prompt_text: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChanges {
    pub username: String,
    pub avatar_url: Option<String>,
}
