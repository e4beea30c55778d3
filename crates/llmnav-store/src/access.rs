// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use llmnav_app::{
    Link, LinkFieldUpdate, LinkFormInput, LinkId, Profile, ProfileFormInput, Prompt,
    PromptFormInput, PromptId, PromptQuery, UserId,
};
use std::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CachedList, Entity, FetchTicket, QueryCache, QueryKey};
use crate::{RemoteStore, remote_message};

/// Result of an independent delete per selected row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkDeleteReport {
    pub requested: usize,
    pub deleted: Vec<LinkId>,
    pub failed: Vec<(LinkId, String)>,
}

impl BulkDeleteReport {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Deleted {} of {} row(s)",
            self.deleted.len(),
            self.requested
        );
        if let Some((id, message)) = self.failed.first() {
            summary.push_str(&format!("; Error deleting row {id}: {message}"));
        }
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Cached list reads and invalidating writes over a remote store, scoped
/// to the signed-in user.
#[derive(Debug)]
pub struct DataAccess<S> {
    store: S,
    cache: QueryCache,
    user: Option<UserId>,
}

impl<S: RemoteStore> DataAccess<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: QueryCache::new(),
            user: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Switch the acting user. Cached lists of a previous user are dropped.
    pub fn set_user(&mut self, user: Option<UserId>, access_token: Option<&str>) {
        if let Some(previous) = &self.user
            && Some(previous) != user.as_ref()
        {
            self.cache.remove_user(previous);
        }
        self.store.set_access_token(access_token);
        self.user = user;
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Link list; empty without a remote call while nobody is signed in.
    pub fn links(&mut self) -> Result<Vec<Link>> {
        let Some(user) = self.user.clone() else {
            return Ok(Vec::new());
        };
        let key = QueryKey::links(&user);
        if let Some(CachedList::Links(links)) = self.cache.fresh(&key, Instant::now()) {
            debug!("links cache hit");
            return Ok(links.clone());
        }
        let ticket = self.cache.begin_fetch(key);
        let links = self.store.list_links()?;
        self.cache
            .complete(&ticket, CachedList::Links(links.clone()), Instant::now());
        Ok(links)
    }

    /// Last fetched link list without touching the network.
    pub fn cached_links(&self) -> Option<&[Link]> {
        let user = self.user.as_ref()?;
        match self.cache.peek(&QueryKey::links(user))? {
            CachedList::Links(links) => Some(links),
            CachedList::Prompts(_) => None,
        }
    }

    /// Prompt list for a query. A cache hit issues no ticket, so a fetch
    /// already in flight for the same key stays current.
    pub fn prompts(&mut self, query: &PromptQuery) -> Result<Vec<Prompt>> {
        if let Some(prompts) = self.fresh_prompts(query) {
            debug!("prompts cache hit");
            return Ok(prompts);
        }
        let Some(ticket) = self.begin_prompt_fetch(query) else {
            return Ok(Vec::new());
        };
        let prompts = self.store.list_prompts(query)?;
        self.complete_prompt_fetch(&ticket, prompts.clone());
        Ok(prompts)
    }

    /// Cached prompt list when still fresh.
    pub fn fresh_prompts(&self, query: &PromptQuery) -> Option<Vec<Prompt>> {
        let user = self.user.as_ref()?;
        match self
            .cache
            .fresh(&QueryKey::prompts(user, query), Instant::now())?
        {
            CachedList::Prompts(prompts) => Some(prompts.clone()),
            CachedList::Links(_) => None,
        }
    }

    /// Issue a ticket for a prompt fetch run elsewhere. `None` without a user.
    pub fn begin_prompt_fetch(&mut self, query: &PromptQuery) -> Option<FetchTicket> {
        let user = self.user.as_ref()?;
        Some(self.cache.begin_fetch(QueryKey::prompts(user, query)))
    }

    /// Store a prompt fetch result; false when a newer fetch superseded it.
    pub fn complete_prompt_fetch(&mut self, ticket: &FetchTicket, prompts: Vec<Prompt>) -> bool {
        self.cache
            .complete(ticket, CachedList::Prompts(prompts), Instant::now())
    }

    pub fn refresh_links(&mut self) -> Result<Vec<Link>> {
        if let Some(user) = &self.user {
            self.cache.invalidate(Entity::Links, user);
        }
        self.links()
    }

    /// Mark every cached prompt list stale so the next read refetches.
    pub fn invalidate_prompts(&mut self) {
        if let Some(user) = &self.user {
            self.cache.invalidate(Entity::Prompts, user);
        }
    }

    /// Create or, for an edit form, replace a link.
    pub fn save_link(&mut self, input: &LinkFormInput) -> Result<(Link, SaveOutcome)> {
        let Some(user) = self.user.clone() else {
            bail!("You must be logged in to create a link");
        };
        let saved = match &input.editing {
            Some(id) => {
                let changes = input.to_changes()?;
                (self.store.replace_link(id, &changes)?, SaveOutcome::Updated)
            }
            None => {
                let new_link = input.to_new_link(&user)?;
                (self.store.insert_link(&new_link)?, SaveOutcome::Created)
            }
        };
        self.cache.invalidate(Entity::Links, &user);
        Ok(saved)
    }

    pub fn update_link_field(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link> {
        let user = self.require_user()?;
        let link = self.store.update_link(id, update)?;
        self.cache.invalidate(Entity::Links, &user);
        Ok(link)
    }

    pub fn delete_link(&mut self, id: &LinkId) -> Result<()> {
        let user = self.require_user()?;
        self.store.delete_link(id)?;
        self.cache.invalidate(Entity::Links, &user);
        Ok(())
    }

    /// One independent delete per id. Failures do not stop the rest and
    /// nothing is rolled back.
    pub fn bulk_delete_links(&mut self, ids: &[LinkId]) -> Result<BulkDeleteReport> {
        let user = self.require_user()?;
        let mut report = BulkDeleteReport {
            requested: ids.len(),
            ..BulkDeleteReport::default()
        };
        for id in ids {
            match self.store.delete_link(id) {
                Ok(()) => report.deleted.push(id.clone()),
                Err(error) => {
                    warn!(link = %id, error = %error, "bulk delete failed for row");
                    report.failed.push((id.clone(), remote_message(&error)));
                }
            }
        }
        if !report.deleted.is_empty() {
            self.cache.invalidate(Entity::Links, &user);
        }
        Ok(report)
    }

    pub fn save_prompt(&mut self, input: &PromptFormInput) -> Result<(Prompt, SaveOutcome)> {
        input.validate()?;
        let Some(user) = self.user.clone() else {
            bail!("User must be authenticated");
        };
        let saved = match &input.editing {
            Some(id) => (
                self.store.update_prompt(id, &input.to_changes()?)?,
                SaveOutcome::Updated,
            ),
            None => (
                self.store.insert_prompt(&input.to_new_prompt(&user)?)?,
                SaveOutcome::Created,
            ),
        };
        self.cache.invalidate(Entity::Prompts, &user);
        Ok(saved)
    }

    pub fn delete_prompt(&mut self, id: &PromptId) -> Result<()> {
        let user = self.require_user()?;
        self.store.delete_prompt(id)?;
        self.cache.invalidate(Entity::Prompts, &user);
        Ok(())
    }

    pub fn fetch_profile(&self) -> Result<Option<Profile>> {
        match &self.user {
            Some(user) => self.store.fetch_profile(user),
            None => Ok(None),
        }
    }

    /// Validate, check a changed username is free, then save.
    pub fn update_profile(&mut self, input: &ProfileFormInput) -> Result<Profile> {
        let Some(user) = self.user.clone() else {
            bail!("You must be logged in to update your profile");
        };
        let changes = input.to_changes()?;
        if input.username_changed() && !self.store.username_available(&changes.username)? {
            bail!("Username is already taken");
        }
        self.store.update_profile(&user, &changes)
    }

    fn require_user(&self) -> Result<UserId> {
        match &self.user {
            Some(user) => Ok(user.clone()),
            None => bail!("You must be logged in -- sign in from the profile tab"),
        }
    }
}
