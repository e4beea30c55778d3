// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{CATEGORY_ALL, CategorySelection, Link, Prompt};

/// Filter state of the links page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFilter {
    pub search_term: String,
    pub category: CategorySelection,
    pub popular_only: bool,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            category: CategorySelection::Popular,
            popular_only: true,
        }
    }
}

impl LinkFilter {
    pub fn matches(&self, link: &Link) -> bool {
        self.matches_term(link) && self.matches_category(link) && self.matches_popularity(link)
    }

    /// Full scan; keeps input order.
    pub fn apply<'a>(&self, links: &'a [Link]) -> Vec<&'a Link> {
        links.iter().filter(|link| self.matches(link)).collect()
    }

    fn matches_term(&self, link: &Link) -> bool {
        if self.search_term.is_empty() {
            return true;
        }
        let needle = self.search_term.to_lowercase();
        contains_folded(&link.name, &needle)
            || contains_folded(&link.model, &needle)
            || contains_folded(&link.description, &needle)
            || link.tags.iter().any(|tag| contains_folded(tag, &needle))
    }

    fn matches_category(&self, link: &Link) -> bool {
        match self.category.named() {
            None => true,
            Some(category) => link.category.iter().any(|entry| entry == category),
        }
    }

    fn matches_popularity(&self, link: &Link) -> bool {
        !self.popular_only || link.is_popular
    }
}

/// Column filters of the table page. Independent of the links page, so
/// every row shows until a name or model filter is typed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableFilter {
    pub name: String,
    pub model: String,
}

impl TableFilter {
    pub fn matches(&self, link: &Link) -> bool {
        column_matches(&link.name, &self.name) && column_matches(&link.model, &self.model)
    }

    /// Keeps input order.
    pub fn apply<'a>(&self, links: &'a [Link]) -> Vec<&'a Link> {
        links.iter().filter(|link| self.matches(link)).collect()
    }

    pub fn is_active(&self) -> bool {
        !self.name.is_empty() || !self.model.is_empty()
    }
}

fn column_matches(value: &str, filter: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty() || contains_folded(value, &filter.to_lowercase())
}

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    haystack.to_lowercase().contains(folded_needle)
}

/// Sorted union of every category across the given links, independent of any
/// active filter. Empty entries are skipped.
pub fn link_category_options(links: &[Link]) -> Vec<String> {
    sorted_union(links.iter().flat_map(|link| link.category.iter()))
}

/// Sorted union of categories across the prompt list as loaded. The list is
/// whatever the current query returned, so options narrow with the filter.
pub fn prompt_category_options(prompts: &[Prompt]) -> Vec<String> {
    sorted_union(prompts.iter().flat_map(|prompt| prompt.category.iter()))
}

pub fn prompt_tag_options(prompts: &[Prompt]) -> Vec<String> {
    sorted_union(prompts.iter().flat_map(|prompt| prompt.tags.iter()))
}

fn sorted_union<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values
        .filter(|value| !value.is_empty())
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkStats {
    pub total: usize,
    pub popular: usize,
    pub categories: usize,
}

impl LinkStats {
    pub fn from_links(links: &[Link]) -> Self {
        Self {
            total: links.len(),
            popular: links.iter().filter(|link| link.is_popular).count(),
            categories: link_category_options(links).len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PromptStats {
    pub total: usize,
    pub categories: usize,
}

impl PromptStats {
    pub fn from_prompts(prompts: &[Prompt]) -> Self {
        Self {
            total: prompts.len(),
            categories: prompt_category_options(prompts).len(),
        }
    }
}

/// Typed prompt query. The store translates it into remote filter syntax in
/// exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PromptQuery {
    pub term: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl PromptQuery {
    pub fn with_term(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }

    pub fn trimmed_term(&self) -> Option<&str> {
        let trimmed = self.term.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Category restriction, if any. `all` means none.
    pub fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|category| !category.is_empty() && *category != CATEGORY_ALL)
    }

    pub fn is_unfiltered(&self) -> bool {
        self.trimmed_term().is_none() && self.category_filter().is_none() && self.tags.is_empty()
    }
}
