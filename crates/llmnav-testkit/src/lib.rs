// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use llmnav_app::{
    DEFAULT_LINK_CATEGORIES, DEFAULT_LINK_TAGS, DEFAULT_PROMPT_CATEGORIES, KNOWN_MODELS, Link,
    LinkId, Prompt, PromptId, UserId,
};
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime, Time};

const REFERENCE_YEAR: i32 = 2026;

const LINK_SUBJECTS: [&str; 14] = [
    "Grammar",
    "JSON",
    "Regex",
    "SQL",
    "Resume",
    "Essay",
    "Commit Message",
    "Unit Test",
    "Translation",
    "Summary",
    "Email",
    "Markdown",
    "Docstring",
    "Changelog",
];

const LINK_ROLES: [&str; 8] = [
    "Fixer",
    "Formatter",
    "Helper",
    "Reviewer",
    "Explainer",
    "Coach",
    "Writer",
    "Builder",
];

const HOSTS: [&str; 5] = [
    "chat.openai.com/g",
    "claude.ai/project",
    "gemini.google.com/gem",
    "poe.com",
    "huggingface.co/chat/assistant",
];

const PROMPT_VERBS: [&str; 10] = [
    "Rewrite",
    "Summarize",
    "Translate",
    "Explain",
    "Outline",
    "Shorten",
    "Review",
    "Format",
    "Expand",
    "Critique",
];

const PROMPT_TAGS: [&str; 10] = [
    "email", "writing", "study", "markdown", "code", "lang", "tone", "notes", "docs", "review",
];

const WORDS: [&str; 24] = [
    "clear", "concise", "friendly", "formal", "structured", "accurate", "brief", "detailed",
    "text", "paragraph", "draft", "outline", "example", "answer", "list", "table", "code",
    "summary", "notes", "reader", "audience", "tone", "style", "format",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Reproducible link and prompt rows for tests and fixtures.
#[derive(Debug, Clone)]
pub struct RowFaker {
    rng: DeterministicRng,
    counter: usize,
}

impl RowFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            counter: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn link(&mut self, owner: Option<&UserId>) -> Link {
        self.counter += 1;
        let subject = self.pick(&LINK_SUBJECTS);
        let role = self.pick(&LINK_ROLES);
        let name = format!("{subject} {role}");
        let slug = name.to_ascii_lowercase().replace(' ', "-");
        let host = self.pick(&HOSTS);
        let category_count = 1 + self.rng.int_n(2);
        let tag_count = self.rng.int_n(3);

        Link {
            id: LinkId::new(format!("link-{:04}", self.counter)),
            url: format!("https://{host}/{slug}-{}", self.counter),
            model: self.pick(&KNOWN_MODELS).to_owned(),
            description: self.sentence(4, 10),
            category: self.distinct(&DEFAULT_LINK_CATEGORIES, category_count),
            tags: self.distinct(&DEFAULT_LINK_TAGS, tag_count),
            is_popular: self.rng.bool(),
            created_at: reference_now() - Duration::minutes(self.counter as i64),
            user_id: owner.cloned(),
            name,
        }
    }

    pub fn links(&mut self, count: usize, owner: Option<&UserId>) -> Vec<Link> {
        (0..count).map(|_| self.link(owner)).collect()
    }

    pub fn prompt(&mut self, owner: Option<&UserId>) -> Prompt {
        self.counter += 1;
        let verb = self.pick(&PROMPT_VERBS);
        let object = self.pick(&WORDS);
        let stamp = reference_now() - Duration::hours(self.counter as i64);
        let description = self.rng.bool().then(|| self.sentence(3, 8));
        let tag_count = self.rng.int_n(3);

        Prompt {
            id: PromptId::new(format!("prompt-{:04}", self.counter)),
            user_id: owner.cloned(),
            title: format!("{verb} the {object}"),
            category: self.distinct(&DEFAULT_PROMPT_CATEGORIES, 1),
            description,
            prompt_text: format!("{verb} the following {object}. {}", self.sentence(6, 14)),
            tags: self.distinct(&PROMPT_TAGS, tag_count),
            created_at: stamp,
            updated_at: stamp,
        }
    }

    pub fn prompts(&mut self, count: usize, owner: Option<&UserId>) -> Vec<Prompt> {
        (0..count).map(|_| self.prompt(owner)).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn distinct(&mut self, items: &[&str], count: usize) -> Vec<String> {
        let mut chosen = Vec::with_capacity(count);
        let mut attempts = 0;
        while chosen.len() < count.min(items.len()) && attempts < items.len() * 4 {
            let value = items[self.rng.int_n(items.len())].to_owned();
            if !chosen.contains(&value) {
                chosen.push(value);
            }
            attempts += 1;
        }
        chosen
    }

    fn sentence(&mut self, min_words: usize, max_words: usize) -> String {
        let count = min_words + self.rng.int_n(max_words.saturating_sub(min_words) + 1);
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(self.pick(&WORDS).to_owned());
        }
        let mut sentence = parts.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

pub fn temp_session_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("session.json");
    Ok((dir, path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56+00:00"
}

pub fn fixture_user() -> UserId {
    UserId::new("00000000-0000-4000-8000-000000000001")
}

fn reference_now() -> OffsetDateTime {
    let date = Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1)
        .unwrap_or(Date::MIN);
    date.with_time(Time::MIDNIGHT).assume_utc()
}
