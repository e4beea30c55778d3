// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use llmnav_app::{
    Link, LinkChanges, LinkFieldUpdate, LinkId, NewLink, NewPrompt, Profile, ProfileChanges,
    Prompt, PromptChanges, PromptId, PromptQuery, Session, User, UserId,
};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{AuthError, AuthService, PromptReader, RemoteStore};

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo-pass";
const DEMO_EMAIL: &str = "demo@llmnav.local";

/// Session lifetime handed out by the in-memory auth service.
const TOKEN_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    email: String,
    password: String,
}

/// Process-local backend used by `--demo` and tests. Rows are scoped to the
/// bearer token the same way row-level security scopes them remotely.
#[derive(Debug, Default)]
pub struct MemoryStore {
    links: Vec<Link>,
    prompts: Vec<Prompt>,
    profiles: BTreeMap<UserId, Profile>,
    accounts: Vec<Account>,
    tokens: BTreeMap<String, UserId>,
    access_token: Option<String>,
    failing_deletes: BTreeSet<LinkId>,
    detached_reads: bool,
    list_calls: Cell<usize>,
    write_calls: usize,
    delete_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one demo account and a few rows it owns.
    pub fn demo() -> Result<Self> {
        let mut store = Self::new();
        let user_id = store.register(DEMO_EMAIL, DEMO_PASSWORD, DEMO_USERNAME)?;
        let now = OffsetDateTime::now_utc();

        let seed_links = [
            (
                "Grammar Fixer",
                "https://chat.openai.com/g/grammar-fixer",
                "GPT-4",
                "Corrects grammar and tone in pasted text",
                &["English Expert"][..],
                &["AI"][..],
                true,
            ),
            (
                "JSON Formatter",
                "https://chat.openai.com/g/json-formatter",
                "GPT-4o",
                "Pretty-prints and validates JSON",
                &["Formatters"][..],
                &["API", "Database"][..],
                true,
            ),
            (
                "Rust Reviewer",
                "https://claude.ai/project/rust-reviewer",
                "Claude 3.5 Sonnet",
                "Reviews Rust code for ownership mistakes",
                &["Code Assistant", "General Experts"][..],
                &["ML"][..],
                false,
            ),
            (
                "SQL Helper",
                "https://gemini.google.com/gem/sql-helper",
                "Gemini 1.5 Pro",
                "Explains and optimizes SQL queries",
                &["Data Analysis"][..],
                &["Database"][..],
                false,
            ),
        ];
        for (age, (name, url, model, description, category, tags, is_popular)) in
            seed_links.into_iter().enumerate()
        {
            store.links.push(Link {
                id: LinkId::new(Uuid::new_v4().to_string()),
                name: name.to_owned(),
                url: url.to_owned(),
                model: model.to_owned(),
                description: description.to_owned(),
                category: owned(category),
                tags: owned(tags),
                is_popular,
                created_at: now - Duration::minutes(age as i64),
                user_id: Some(user_id.clone()),
            });
        }

        let seed_prompts = [
            (
                "Email polisher",
                "Enhancer",
                Some("Makes short emails sound professional"),
                "Rewrite the following email so it is polite and concise.",
                &["email", "writing"][..],
            ),
            (
                "Markdown table",
                "Formatter",
                None,
                "Turn the list below into a Markdown table with a header row.",
                &["markdown"][..],
            ),
            (
                "Flashcards",
                "Study Expert",
                Some("Builds question and answer pairs"),
                "Create ten flashcards covering the key ideas of this chapter.",
                &["study"][..],
            ),
        ];
        for (age, (title, category, description, prompt_text, tags)) in
            seed_prompts.into_iter().enumerate()
        {
            let stamp = now - Duration::minutes(age as i64);
            store.prompts.push(Prompt {
                id: PromptId::new(Uuid::new_v4().to_string()),
                user_id: Some(user_id.clone()),
                title: title.to_owned(),
                category: vec![category.to_owned()],
                description: description.map(str::to_owned),
                prompt_text: prompt_text.to_owned(),
                tags: owned(tags),
                created_at: stamp,
                updated_at: stamp,
            });
        }
        debug!(
            links = store.links.len(),
            prompts = store.prompts.len(),
            "seeded demo store"
        );
        Ok(store)
    }

    /// Make every delete of this link fail until the store is dropped.
    pub fn fail_deletes_for(&mut self, id: &LinkId) {
        self.failing_deletes.insert(id.clone());
    }

    /// Hand out snapshot readers so prompt lists load off the calling
    /// thread, the way the HTTP client does.
    pub fn detach_prompt_reads(&mut self) {
        self.detached_reads = true;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls
    }

    fn register(&mut self, email: &str, password: &str, username: &str) -> Result<UserId> {
        if self.accounts.iter().any(|account| account.email == email) {
            return Err(AuthError::SignUpRejected("User already registered".to_owned()).into());
        }
        if self.profile_named(username).is_some() {
            return Err(AuthError::SignUpRejected("Username is already taken".to_owned()).into());
        }
        let user_id = UserId::new(Uuid::new_v4().to_string());
        self.accounts.push(Account {
            user_id: user_id.clone(),
            email: email.to_owned(),
            password: password.to_owned(),
        });
        self.profiles.insert(
            user_id.clone(),
            Profile {
                id: user_id.clone(),
                username: username.to_owned(),
                avatar_url: None,
                updated_at: None,
            },
        );
        Ok(user_id)
    }

    fn issue_session(&mut self, user_id: &UserId) -> Result<Session> {
        let account = self
            .accounts
            .iter()
            .find(|account| &account.user_id == user_id)
            .ok_or_else(|| anyhow!("account {user_id} vanished"))?;
        let access_token = Uuid::new_v4().to_string();
        let session = Session {
            access_token: access_token.clone(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Some(OffsetDateTime::now_utc().unix_timestamp() + TOKEN_TTL_SECONDS),
            user: User {
                id: user_id.clone(),
                email: account.email.clone(),
                username: self.profiles.get(user_id).map(|profile| profile.username.clone()),
            },
        };
        self.tokens.insert(access_token, user_id.clone());
        Ok(session)
    }

    fn profile_named(&self, username: &str) -> Option<&Profile> {
        self.profiles
            .values()
            .find(|profile| profile.username == username)
    }

    fn caller(&self) -> Result<UserId> {
        self.access_token
            .as_ref()
            .and_then(|token| self.tokens.get(token))
            .cloned()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    fn visible_to(owner: Option<&UserId>, caller: &UserId) -> bool {
        owner.is_none_or(|owner| owner == caller)
    }

    fn link_mut(&mut self, id: &LinkId) -> Result<&mut Link> {
        let caller = self.caller()?;
        self.links
            .iter_mut()
            .find(|link| &link.id == id && Self::visible_to(link.user_id.as_ref(), &caller))
            .ok_or_else(|| anyhow!("link {id} not found"))
    }

    fn prompt_mut(&mut self, id: &PromptId) -> Result<&mut Prompt> {
        let caller = self.caller()?;
        self.prompts
            .iter_mut()
            .find(|prompt| &prompt.id == id && Self::visible_to(prompt.user_id.as_ref(), &caller))
            .ok_or_else(|| anyhow!("prompt {id} not found"))
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

/// Caller-visible prompts as of the moment the reader was handed out.
struct PromptSnapshot {
    prompts: Vec<Prompt>,
}

impl PromptReader for PromptSnapshot {
    fn read_prompts(&self, query: &PromptQuery) -> Result<Vec<Prompt>> {
        Ok(matching_prompts(self.prompts.iter(), query))
    }
}

/// Newest-first prompts passing the query filters.
fn matching_prompts<'a>(
    prompts: impl Iterator<Item = &'a Prompt>,
    query: &PromptQuery,
) -> Vec<Prompt> {
    let mut matched = prompts
        .filter(|prompt| prompt_matches(prompt, query))
        .cloned()
        .collect::<Vec<_>>();
    matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    matched
}

fn prompt_matches(prompt: &Prompt, query: &PromptQuery) -> bool {
    if let Some(term) = query.trimmed_term() {
        let needle = term.to_lowercase();
        let hit = prompt.title.to_lowercase().contains(&needle)
            || prompt
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(&needle))
            || prompt.prompt_text.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }
    if let Some(category) = query.category_filter()
        && !prompt.category.iter().any(|entry| entry == category)
    {
        return false;
    }
    query.tags.iter().all(|tag| prompt.tags.contains(tag))
}

impl RemoteStore for MemoryStore {
    fn set_access_token(&mut self, access_token: Option<&str>) {
        self.access_token = access_token.map(str::to_owned);
    }

    fn list_links(&self) -> Result<Vec<Link>> {
        self.list_calls.set(self.list_calls.get() + 1);
        let caller = self.caller()?;
        let mut links = self
            .links
            .iter()
            .filter(|link| Self::visible_to(link.user_id.as_ref(), &caller))
            .cloned()
            .collect::<Vec<_>>();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    fn insert_link(&mut self, link: &NewLink) -> Result<Link> {
        self.write_calls += 1;
        let caller = self.caller()?;
        if link.user_id != caller {
            bail!("new row violates row-level security policy for table \"llm_links\"");
        }
        let created = Link {
            id: LinkId::new(Uuid::new_v4().to_string()),
            name: link.name.clone(),
            url: link.url.clone(),
            model: link.model.clone(),
            description: link.description.clone(),
            category: link.category.clone(),
            tags: link.tags.clone(),
            is_popular: link.is_popular,
            created_at: OffsetDateTime::now_utc(),
            user_id: Some(caller),
        };
        self.links.push(created.clone());
        Ok(created)
    }

    fn update_link(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link> {
        self.write_calls += 1;
        let link = self.link_mut(id)?;
        update.apply_to(link);
        Ok(link.clone())
    }

    fn replace_link(&mut self, id: &LinkId, changes: &LinkChanges) -> Result<Link> {
        self.write_calls += 1;
        let link = self.link_mut(id)?;
        link.name = changes.name.clone();
        link.url = changes.url.clone();
        link.model = changes.model.clone();
        link.description = changes.description.clone();
        link.category = changes.category.clone();
        link.tags = changes.tags.clone();
        link.is_popular = changes.is_popular;
        Ok(link.clone())
    }

    fn delete_link(&mut self, id: &LinkId) -> Result<()> {
        self.write_calls += 1;
        self.delete_calls += 1;
        if self.failing_deletes.contains(id) {
            bail!("server error (500): could not delete link {id}");
        }
        self.link_mut(id)?;
        self.links.retain(|link| &link.id != id);
        Ok(())
    }

    fn list_prompts(&self, query: &PromptQuery) -> Result<Vec<Prompt>> {
        self.list_calls.set(self.list_calls.get() + 1);
        let caller = self.caller()?;
        Ok(matching_prompts(
            self.prompts
                .iter()
                .filter(|prompt| Self::visible_to(prompt.user_id.as_ref(), &caller)),
            query,
        ))
    }

    fn prompt_reader(&self) -> Option<Box<dyn PromptReader>> {
        if !self.detached_reads {
            return None;
        }
        let caller = self.caller().ok()?;
        self.list_calls.set(self.list_calls.get() + 1);
        let prompts = self
            .prompts
            .iter()
            .filter(|prompt| Self::visible_to(prompt.user_id.as_ref(), &caller))
            .cloned()
            .collect();
        Some(Box::new(PromptSnapshot { prompts }))
    }

    fn insert_prompt(&mut self, prompt: &NewPrompt) -> Result<Prompt> {
        self.write_calls += 1;
        let caller = self.caller()?;
        if prompt.user_id != caller {
            bail!("new row violates row-level security policy for table \"prompts\"");
        }
        let now = OffsetDateTime::now_utc();
        let created = Prompt {
            id: PromptId::new(Uuid::new_v4().to_string()),
            user_id: Some(caller),
            title: prompt.title.clone(),
            category: prompt.category.clone(),
            description: prompt.description.clone(),
            prompt_text: prompt.prompt_text.clone(),
            tags: prompt.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        self.prompts.push(created.clone());
        Ok(created)
    }

    fn update_prompt(&mut self, id: &PromptId, changes: &PromptChanges) -> Result<Prompt> {
        self.write_calls += 1;
        let prompt = self.prompt_mut(id)?;
        prompt.title = changes.title.clone();
        prompt.category = changes.category.clone();
        prompt.description = changes.description.clone();
        prompt.prompt_text = changes.prompt_text.clone();
        prompt.tags = changes.tags.clone();
        prompt.updated_at = OffsetDateTime::now_utc();
        Ok(prompt.clone())
    }

    fn delete_prompt(&mut self, id: &PromptId) -> Result<()> {
        self.write_calls += 1;
        self.prompt_mut(id)?;
        self.prompts.retain(|prompt| &prompt.id != id);
        Ok(())
    }

    fn fetch_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        self.caller()?;
        Ok(self.profiles.get(user_id).cloned())
    }

    fn update_profile(&mut self, user_id: &UserId, changes: &ProfileChanges) -> Result<Profile> {
        self.write_calls += 1;
        if &self.caller()? != user_id {
            bail!("profile {user_id} not found");
        }
        let profile = self
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("profile {user_id} not found"))?;
        profile.username = changes.username.clone();
        profile.avatar_url = changes.avatar_url.clone();
        profile.updated_at = Some(OffsetDateTime::now_utc());
        Ok(profile.clone())
    }

    fn username_available(&self, username: &str) -> Result<bool> {
        Ok(self.profile_named(username).is_none())
    }
}

impl AuthService for MemoryStore {
    fn sign_up(&mut self, email: &str, password: &str, username: &str) -> Result<Option<Session>> {
        let user_id = self.register(email, password, username)?;
        self.issue_session(&user_id).map(Some)
    }

    fn sign_in(&mut self, username: &str, password: &str) -> Result<Session> {
        let user_id = self
            .profile_named(username)
            .map(|profile| profile.id.clone())
            .ok_or(AuthError::InvalidCredentials)?;
        let password_matches = self
            .accounts
            .iter()
            .any(|account| account.user_id == user_id && account.password == password);
        if !password_matches {
            return Err(AuthError::InvalidCredentials.into());
        }
        self.issue_session(&user_id)
    }

    fn sign_out(&mut self, session: &Session) -> Result<()> {
        self.tokens.remove(&session.access_token);
        if self.access_token.as_deref() == Some(session.access_token.as_str()) {
            self.access_token = None;
        }
        Ok(())
    }

    fn current_user(&self, access_token: &str) -> Result<User> {
        let user_id = self
            .tokens
            .get(access_token)
            .ok_or(AuthError::NotAuthenticated)?;
        let account = self
            .accounts
            .iter()
            .find(|account| &account.user_id == user_id)
            .ok_or(AuthError::NotAuthenticated)?;
        Ok(User {
            id: user_id.clone(),
            email: account.email.clone(),
            username: self.profiles.get(user_id).map(|profile| profile.username.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DEMO_PASSWORD, DEMO_USERNAME, MemoryStore};
    use crate::{AuthError, AuthService, PromptReader, RemoteStore};
    use anyhow::Result;
    use llmnav_app::{LinkFieldUpdate, PromptQuery};

    fn signed_in_demo() -> Result<MemoryStore> {
        let mut store = MemoryStore::demo()?;
        let session = store.sign_in(DEMO_USERNAME, DEMO_PASSWORD)?;
        store.set_access_token(Some(&session.access_token));
        Ok(store)
    }

    #[test]
    fn wrong_password_and_unknown_user_share_one_error() -> Result<()> {
        let mut store = MemoryStore::demo()?;
        for (username, password) in [(DEMO_USERNAME, "nope"), ("ghost", DEMO_PASSWORD)] {
            let err = store.sign_in(username, password).expect_err("bad credentials");
            assert_eq!(
                err.downcast_ref::<AuthError>(),
                Some(&AuthError::InvalidCredentials)
            );
        }
        Ok(())
    }

    #[test]
    fn rows_require_a_token() -> Result<()> {
        let store = MemoryStore::demo()?;
        let err = store.list_links().expect_err("anonymous list");
        assert_eq!(err.downcast_ref::<AuthError>(), Some(&AuthError::NotAuthenticated));
        Ok(())
    }

    #[test]
    fn demo_links_are_newest_first() -> Result<()> {
        let store = signed_in_demo()?;
        let links = store.list_links()?;
        assert_eq!(links.len(), 4);
        assert_eq!(links[0].name, "Grammar Fixer");
        assert!(links.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
        Ok(())
    }

    #[test]
    fn prompt_query_filters_term_category_and_tags() -> Result<()> {
        let store = signed_in_demo()?;
        let by_term = store.list_prompts(&PromptQuery::with_term("EMAIL"))?;
        assert_eq!(by_term.len(), 1);
        assert_eq!(by_term[0].title, "Email polisher");

        let by_category = store.list_prompts(&PromptQuery {
            category: Some("Formatter".to_owned()),
            ..PromptQuery::default()
        })?;
        assert_eq!(by_category.len(), 1);

        let all = store.list_prompts(&PromptQuery {
            category: Some("all".to_owned()),
            ..PromptQuery::default()
        })?;
        assert_eq!(all.len(), 3);

        let by_tags = store.list_prompts(&PromptQuery {
            tags: vec!["email".to_owned(), "writing".to_owned()],
            ..PromptQuery::default()
        })?;
        assert_eq!(by_tags.len(), 1);
        Ok(())
    }

    #[test]
    fn other_users_cannot_touch_demo_rows() -> Result<()> {
        let mut store = MemoryStore::demo()?;
        let demo = store.sign_in(DEMO_USERNAME, DEMO_PASSWORD)?;
        store.set_access_token(Some(&demo.access_token));
        let link_id = store.list_links()?[0].id.clone();

        let other = store
            .sign_up("eve@example.com", "secret-1", "eve")?
            .expect("auto-confirmed");
        store.set_access_token(Some(&other.access_token));
        assert!(store.list_links()?.is_empty());
        let err = store
            .update_link(&link_id, &LinkFieldUpdate::Popular(false))
            .expect_err("foreign row");
        assert!(err.to_string().contains("not found"));
        Ok(())
    }

    #[test]
    fn detached_reader_matches_inline_listing_from_another_thread() -> Result<()> {
        let mut store = signed_in_demo()?;
        assert!(store.prompt_reader().is_none());

        store.detach_prompt_reads();
        let query = PromptQuery::with_term("email");
        let inline = store.list_prompts(&query)?;
        let reader = store.prompt_reader().expect("detached reads enabled");
        let detached = std::thread::spawn(move || reader.read_prompts(&query))
            .join()
            .expect("reader thread")?;
        assert!(!detached.is_empty());
        assert_eq!(detached, inline);

        store.set_access_token(None);
        assert!(store.prompt_reader().is_none());
        Ok(())
    }

    #[test]
    fn duplicate_sign_up_is_rejected() -> Result<()> {
        let mut store = MemoryStore::demo()?;
        let err = store
            .sign_up("demo@llmnav.local", "secret-1", "someone")
            .expect_err("duplicate email");
        assert_eq!(err.to_string(), "Sign up failed: User already registered");
        Ok(())
    }

    #[test]
    fn sign_out_revokes_the_token() -> Result<()> {
        let mut store = MemoryStore::demo()?;
        let session = store.sign_in(DEMO_USERNAME, DEMO_PASSWORD)?;
        assert_eq!(
            store.current_user(&session.access_token)?.username.as_deref(),
            Some(DEMO_USERNAME)
        );
        store.sign_out(&session)?;
        let err = store
            .current_user(&session.access_token)
            .expect_err("revoked token");
        assert_eq!(err.downcast_ref::<AuthError>(), Some(&AuthError::NotAuthenticated));
        Ok(())
    }
}
