// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use llmnav_app::{Link, Prompt, PromptQuery, UserId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

pub const LINK_STALE_TIME: Duration = Duration::ZERO;
pub const PROMPT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Links,
    Prompts,
}

impl Entity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Prompts => "prompts",
        }
    }
}

/// Identity of one cached list: entity, owner and (for prompts) the filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Links { user: UserId },
    Prompts { user: UserId, query: PromptQuery },
}

impl QueryKey {
    pub fn links(user: &UserId) -> Self {
        Self::Links { user: user.clone() }
    }

    pub fn prompts(user: &UserId, query: &PromptQuery) -> Self {
        Self::Prompts {
            user: user.clone(),
            query: query.clone(),
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            Self::Links { .. } => Entity::Links,
            Self::Prompts { .. } => Entity::Prompts,
        }
    }

    pub fn user(&self) -> &UserId {
        match self {
            Self::Links { user } | Self::Prompts { user, .. } => user,
        }
    }

    pub fn stale_time(&self) -> Duration {
        match self.entity() {
            Entity::Links => LINK_STALE_TIME,
            Entity::Prompts => PROMPT_STALE_TIME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedList {
    Links(Vec<Link>),
    Prompts(Vec<Prompt>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: CachedList,
    fetched_at: Instant,
    invalidated: bool,
}

/// Proof that a fetch was issued. Only the newest ticket per key may store
/// its result. Generations come from one counter across all keys, so they
/// never repeat for the life of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
    latest: HashMap<QueryKey, u64>,
    next_generation: u64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_fetch(&mut self, key: QueryKey) -> FetchTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.latest.insert(key.clone(), generation);
        FetchTicket { key, generation }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.latest.get(&ticket.key) == Some(&ticket.generation)
    }

    /// Store a fetch result. Returns false and drops the value when a newer
    /// fetch for the same key has been issued since.
    pub fn complete(&mut self, ticket: &FetchTicket, value: CachedList, now: Instant) -> bool {
        if !self.is_current(ticket) {
            debug!(
                entity = ticket.key.entity().as_str(),
                generation = ticket.generation,
                "discarding stale response"
            );
            return false;
        }
        self.entries.insert(
            ticket.key.clone(),
            Entry {
                value,
                fetched_at: now,
                invalidated: false,
            },
        );
        true
    }

    /// Cached value when present, fresh and not invalidated.
    pub fn fresh(&self, key: &QueryKey, now: Instant) -> Option<&CachedList> {
        let entry = self.entries.get(key)?;
        if entry.invalidated {
            return None;
        }
        let age = now.saturating_duration_since(entry.fetched_at);
        (age < key.stale_time()).then_some(&entry.value)
    }

    /// Cached value regardless of freshness.
    pub fn peek(&self, key: &QueryKey) -> Option<&CachedList> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Mark every list of this entity owned by the user as needing a refetch.
    pub fn invalidate(&mut self, entity: Entity, user: &UserId) -> usize {
        let mut count = 0;
        for (key, entry) in &mut self.entries {
            if key.entity() == entity && key.user() == user {
                entry.invalidated = true;
                count += 1;
            }
        }
        debug!(entity = entity.as_str(), count, "invalidated cached lists");
        count
    }

    /// Forget everything cached for a user, e.g. on sign-out.
    pub fn remove_user(&mut self, user: &UserId) {
        self.entries.retain(|key, _| key.user() != user);
        self.latest.retain(|key, _| key.user() != user);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{CachedList, Entity, PROMPT_STALE_TIME, QueryCache, QueryKey};
    use llmnav_app::{PromptQuery, UserId};
    use std::time::{Duration, Instant};

    fn user() -> UserId {
        UserId::new("u1")
    }

    #[test]
    fn stale_ticket_results_are_discarded() {
        let mut cache = QueryCache::new();
        let key = QueryKey::prompts(&user(), &PromptQuery::with_term("e"));
        let first = cache.begin_fetch(key.clone());
        let second = cache.begin_fetch(key.clone());
        let now = Instant::now();

        assert!(cache.complete(&second, CachedList::Prompts(Vec::new()), now));
        assert!(!cache.complete(&first, CachedList::Links(Vec::new()), now));
        assert_eq!(cache.peek(&key), Some(&CachedList::Prompts(Vec::new())));
    }

    #[test]
    fn link_lists_are_never_fresh_and_prompts_last_five_minutes() {
        let mut cache = QueryCache::new();
        let now = Instant::now();
        let links = QueryKey::links(&user());
        let prompts = QueryKey::prompts(&user(), &PromptQuery::default());

        let ticket = cache.begin_fetch(links.clone());
        cache.complete(&ticket, CachedList::Links(Vec::new()), now);
        let ticket = cache.begin_fetch(prompts.clone());
        cache.complete(&ticket, CachedList::Prompts(Vec::new()), now);

        assert!(cache.fresh(&links, now).is_none());
        assert!(cache.peek(&links).is_some());
        assert!(cache.fresh(&prompts, now + Duration::from_secs(60)).is_some());
        assert!(cache.fresh(&prompts, now + PROMPT_STALE_TIME).is_none());
    }

    #[test]
    fn invalidation_matches_entity_and_user_prefix() {
        let mut cache = QueryCache::new();
        let now = Instant::now();
        let other = UserId::new("u2");
        for (owner, term) in [(user(), "a"), (user(), "b"), (other.clone(), "a")] {
            let ticket = cache.begin_fetch(QueryKey::prompts(&owner, &PromptQuery::with_term(term)));
            cache.complete(&ticket, CachedList::Prompts(Vec::new()), now);
        }

        assert_eq!(cache.invalidate(Entity::Prompts, &user()), 2);
        assert_eq!(cache.invalidate(Entity::Links, &user()), 0);
        assert!(
            cache
                .fresh(&QueryKey::prompts(&user(), &PromptQuery::with_term("a")), now)
                .is_none()
        );
        assert!(
            cache
                .fresh(&QueryKey::prompts(&other, &PromptQuery::with_term("a")), now)
                .is_some()
        );
    }

    #[test]
    fn remove_user_drops_entries_and_generations() {
        let mut cache = QueryCache::new();
        let key = QueryKey::links(&user());
        let ticket = cache.begin_fetch(key.clone());
        cache.complete(&ticket, CachedList::Links(Vec::new()), Instant::now());
        cache.remove_user(&user());
        assert!(cache.is_empty());
        assert!(!cache.is_current(&ticket));
    }

    #[test]
    fn ticket_from_before_sign_out_stays_stale_after_sign_in() {
        let mut cache = QueryCache::new();
        let key = QueryKey::prompts(&user(), &PromptQuery::default());
        let in_flight = cache.begin_fetch(key.clone());

        cache.remove_user(&user());
        let fresh = cache.begin_fetch(key.clone());
        assert_ne!(fresh.generation, in_flight.generation);

        let now = Instant::now();
        assert!(!cache.complete(&in_flight, CachedList::Prompts(Vec::new()), now));
        assert!(cache.peek(&key).is_none());
        assert!(cache.complete(&fresh, CachedList::Prompts(Vec::new()), now));
    }
}
