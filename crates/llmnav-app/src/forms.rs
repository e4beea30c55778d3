// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::{
    FormKind, Link, LinkChanges, LinkId, NewLink, NewPrompt, Profile, ProfileChanges, Prompt,
    PromptChanges, PromptId, UserId, join_list,
};

pub const KNOWN_MODELS: [&str; 12] = [
    "GPT-4",
    "GPT-4o",
    "GPT-4o mini",
    "o1",
    "o3-mini",
    "Claude 3.5 Sonnet",
    "Claude 3 Opus",
    "Gemini 1.5 Pro",
    "Gemini 2.0 Flash",
    "Llama 3.1 70B",
    "Mistral Large",
    "DeepSeek V3",
];

pub const DEFAULT_LINK_CATEGORIES: [&str; 6] = [
    "General Experts",
    "English Expert",
    "Formatters",
    "Code Assistant",
    "Creative Writing",
    "Data Analysis",
];

pub const DEFAULT_LINK_TAGS: [&str; 11] = [
    "SvelteKit",
    "Remix",
    "Vue.js",
    "React",
    "Angular",
    "Node.js",
    "Python",
    "AI",
    "ML",
    "API",
    "Database",
];

pub const DEFAULT_PROMPT_CATEGORIES: [&str; 4] =
    ["Enhancer", "Formatter", "Study Expert", "Code Assistant"];

pub const PROMPT_TITLE_MAX: usize = 100;
pub const PROMPT_DESCRIPTION_MAX: usize = 200;
pub const PROMPT_TEXT_MIN: usize = 10;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 6;

/// How a selector treats values outside its candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagStrategy {
    /// Pick from a fixed library only.
    LibraryMultiselect,
    /// Novel values join the candidate list for the rest of the session.
    InlineCreateTags,
}

/// Multi-value picker shared by every form with category, tag or model
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSelector {
    pub strategy: TagStrategy,
    candidates: Vec<String>,
    selected: Vec<String>,
}

impl TagSelector {
    pub fn new<'a>(strategy: TagStrategy, candidates: impl IntoIterator<Item = &'a str>) -> Self {
        let mut selector = Self {
            strategy,
            candidates: Vec::new(),
            selected: Vec::new(),
        };
        selector.extend_candidates(candidates.into_iter().map(str::to_owned));
        selector
    }

    /// Tag selection used by the link and prompt forms.
    pub fn inline<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(TagStrategy::InlineCreateTags, candidates)
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, value: &str) -> bool {
        self.selected.iter().any(|entry| entry == value)
    }

    /// Adds unseen values to the candidate list, keeping first-seen order.
    pub fn extend_candidates(&mut self, values: impl IntoIterator<Item = String>) {
        for value in values {
            if !value.is_empty() && !self.candidates.contains(&value) {
                self.candidates.push(value);
            }
        }
    }

    /// Pre-select existing values, e.g. when editing a saved row. Values
    /// missing from the candidates are added so they stay visible.
    pub fn preselect(&mut self, values: &[String]) {
        self.extend_candidates(values.iter().cloned());
        for value in values {
            if !self.is_selected(value) {
                self.selected.push(value.clone());
            }
        }
    }

    /// Returns whether the value is selected afterwards.
    pub fn toggle(&mut self, value: &str) -> Result<bool> {
        if !self.candidates.iter().any(|entry| entry == value) {
            bail!("{value} is not an available choice");
        }
        if let Some(position) = self.selected.iter().position(|entry| entry == value) {
            self.selected.remove(position);
            return Ok(false);
        }
        self.selected.push(value.to_owned());
        Ok(true)
    }

    pub fn toggle_index(&mut self, index: usize) -> Result<bool> {
        let value = self
            .candidates
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("choice {} unavailable", index + 1))?;
        self.toggle(&value)
    }

    /// Add a typed value and select it. Returns false when the value already
    /// existed as a candidate.
    pub fn create(&mut self, value: &str) -> Result<bool> {
        let value = value.trim();
        if value.is_empty() {
            bail!("value is empty -- type a name first");
        }
        if self.strategy == TagStrategy::LibraryMultiselect {
            bail!("{value} is not in the list -- pick an existing value");
        }
        let created = !self.candidates.iter().any(|entry| entry == value);
        if created {
            self.candidates.push(value.to_owned());
        }
        if !self.is_selected(value) {
            self.selected.push(value.to_owned());
        }
        Ok(created)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFormInput {
    pub editing: Option<LinkId>,
    pub url: String,
    pub name: String,
    pub model: TagSelector,
    pub description: String,
    pub category: TagSelector,
    pub tags: TagSelector,
    pub is_popular: bool,
}

impl LinkFormInput {
    pub fn blank() -> Self {
        Self {
            editing: None,
            url: String::new(),
            name: String::new(),
            model: TagSelector::new(TagStrategy::LibraryMultiselect, KNOWN_MODELS),
            description: String::new(),
            category: TagSelector::inline(DEFAULT_LINK_CATEGORIES),
            tags: TagSelector::inline(DEFAULT_LINK_TAGS),
            is_popular: false,
        }
    }

    pub fn for_link(link: &Link) -> Self {
        let mut input = Self::blank();
        input.editing = Some(link.id.clone());
        input.url = link.url.clone();
        input.name = link.name.clone();
        if !link.model.is_empty() {
            input.model.preselect(std::slice::from_ref(&link.model));
        }
        input.description = link.description.clone();
        input.category.preselect(&link.category);
        input.tags.preselect(&link.tags);
        input.is_popular = link.is_popular;
        input
    }

    /// First selected model wins.
    pub fn chosen_model(&self) -> Option<&str> {
        self.model.selected().first().map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            bail!("URL is required");
        }
        if self.name.trim().is_empty() {
            bail!("Name is required");
        }
        if self.chosen_model().is_none() {
            bail!("Model is required");
        }
        Ok(())
    }

    pub fn to_new_link(&self, user_id: &UserId) -> Result<NewLink> {
        let changes = self.to_changes()?;
        Ok(NewLink {
            user_id: user_id.clone(),
            name: changes.name,
            url: changes.url,
            model: changes.model,
            description: changes.description,
            category: changes.category,
            tags: changes.tags,
            is_popular: changes.is_popular,
        })
    }

    pub fn to_changes(&self) -> Result<LinkChanges> {
        self.validate()?;
        Ok(LinkChanges {
            name: self.name.trim().to_owned(),
            url: self.url.trim().to_owned(),
            model: self.chosen_model().unwrap_or_default().to_owned(),
            description: self.description.clone(),
            category: self.category.selected().to_vec(),
            tags: self.tags.selected().to_vec(),
            is_popular: self.is_popular,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFormInput {
    pub editing: Option<PromptId>,
    pub title: String,
    pub category: TagSelector,
    pub description: String,
    pub prompt_text: String,
    pub tags: TagSelector,
}

impl PromptFormInput {
    pub fn blank() -> Self {
        Self {
            editing: None,
            title: String::new(),
            category: TagSelector::inline(DEFAULT_PROMPT_CATEGORIES),
            description: String::new(),
            prompt_text: String::new(),
            tags: TagSelector::inline([] as [&str; 0]),
        }
    }

    /// Blank form whose candidates include what the loaded prompts use.
    pub fn blank_with_seen(prompts: &[Prompt]) -> Self {
        let mut input = Self::blank();
        for prompt in prompts {
            input.category.extend_candidates(prompt.category.iter().cloned());
            input.tags.extend_candidates(prompt.tags.iter().cloned());
        }
        input
    }

    pub fn for_prompt(prompt: &Prompt) -> Self {
        let mut input = Self::blank();
        input.editing = Some(prompt.id.clone());
        input.title = prompt.title.clone();
        input.category.preselect(&prompt.category);
        input.description = prompt.description.clone().unwrap_or_default();
        input.prompt_text = prompt.prompt_text.clone();
        input.tags.preselect(&prompt.tags);
        input
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("Title is required");
        }
        if self.category.selected().is_empty() {
            bail!("At least one category is required");
        }
        if self.prompt_text.trim().chars().count() < PROMPT_TEXT_MIN {
            bail!("Prompt text must be at least {PROMPT_TEXT_MIN} characters");
        }
        if self.title.trim().chars().count() > PROMPT_TITLE_MAX {
            bail!("Title must be at most {PROMPT_TITLE_MAX} characters");
        }
        if self.description.trim().chars().count() > PROMPT_DESCRIPTION_MAX {
            bail!("Description must be at most {PROMPT_DESCRIPTION_MAX} characters");
        }
        Ok(())
    }

    pub fn to_changes(&self) -> Result<PromptChanges> {
        self.validate()?;
        let description = self.description.trim();
        Ok(PromptChanges {
            title: self.title.trim().to_owned(),
            category: self.category.selected().to_vec(),
            description: (!description.is_empty()).then(|| description.to_owned()),
            prompt_text: self.prompt_text.trim().to_owned(),
            tags: self.tags.selected().to_vec(),
        })
    }

    pub fn to_new_prompt(&self, user_id: &UserId) -> Result<NewPrompt> {
        let changes = self.to_changes()?;
        Ok(NewPrompt {
            user_id: user_id.clone(),
            title: changes.title,
            category: changes.category,
            description: changes.description,
            prompt_text: changes.prompt_text,
            tags: changes.tags,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFormInput {
    /// Username as saved, used to decide whether uniqueness must be checked.
    pub current_username: String,
    pub username: String,
    pub avatar_url: String,
}

impl ProfileFormInput {
    pub fn for_profile(profile: Option<&Profile>) -> Self {
        let username = profile
            .map(|profile| profile.username.clone())
            .unwrap_or_default();
        Self {
            current_username: username.clone(),
            username,
            avatar_url: profile
                .and_then(|profile| profile.avatar_url.clone())
                .unwrap_or_default(),
        }
    }

    pub fn username_changed(&self) -> bool {
        self.username.trim() != self.current_username
    }

    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        let avatar_url = self.avatar_url.trim();
        if !avatar_url.is_empty() && url::Url::parse(avatar_url).is_err() {
            bail!("Please enter a valid URL");
        }
        Ok(())
    }

    pub fn to_changes(&self) -> Result<ProfileChanges> {
        self.validate()?;
        let avatar_url = self.avatar_url.trim();
        Ok(ProfileChanges {
            username: self.username.trim().to_owned(),
            avatar_url: (!avatar_url.is_empty()).then(|| avatar_url.to_owned()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignInFormInput {
    pub username: String,
    pub password: String,
}

impl SignInFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("Please enter your username");
        }
        if self.password.is_empty() {
            bail!("Please enter your password");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignUpFormInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpFormInput {
    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        if !looks_like_email(self.email.trim()) {
            bail!("Please enter a valid email address");
        }
        if self.password.chars().count() < PASSWORD_MIN {
            bail!("Password must be at least {PASSWORD_MIN} characters");
        }
        if self.password != self.confirm_password {
            bail!("Passwords don't match");
        }
        Ok(())
    }
}

fn validate_username(username: &str) -> Result<()> {
    let length = username.trim().chars().count();
    if length < USERNAME_MIN {
        bail!("Username must be at least {USERNAME_MIN} characters");
    }
    if length > USERNAME_MAX {
        bail!("Username must be less than {USERNAME_MAX} characters");
    }
    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormPayload {
    Link(LinkFormInput),
    Prompt(PromptFormInput),
    Profile(ProfileFormInput),
    SignIn(SignInFormInput),
    SignUp(SignUpFormInput),
}

/// How a form field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Secret,
    Multiline,
    Choice,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormFieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FormFieldSpec {
    FormFieldSpec { key, label, kind }
}

const LINK_FIELDS: &[FormFieldSpec] = &[
    field("url", "URL", FieldKind::Text),
    field("name", "Name", FieldKind::Text),
    field("model", "Model", FieldKind::Choice),
    field("description", "Description", FieldKind::Multiline),
    field("category", "Categories", FieldKind::Choice),
    field("tags", "Tags", FieldKind::Choice),
    field("is_popular", "Popular", FieldKind::Toggle),
];

const PROMPT_FIELDS: &[FormFieldSpec] = &[
    field("title", "Title", FieldKind::Text),
    field("category", "Categories", FieldKind::Choice),
    field("description", "Description", FieldKind::Multiline),
    field("prompt_text", "Prompt", FieldKind::Multiline),
    field("tags", "Tags", FieldKind::Choice),
];

const PROFILE_FIELDS: &[FormFieldSpec] = &[
    field("username", "Username", FieldKind::Text),
    field("avatar_url", "Avatar URL", FieldKind::Text),
];

const SIGN_IN_FIELDS: &[FormFieldSpec] = &[
    field("username", "Username", FieldKind::Text),
    field("password", "Password", FieldKind::Secret),
];

const SIGN_UP_FIELDS: &[FormFieldSpec] = &[
    field("username", "Username", FieldKind::Text),
    field("email", "Email", FieldKind::Text),
    field("password", "Password", FieldKind::Secret),
    field("confirm_password", "Confirm password", FieldKind::Secret),
];

pub fn form_field_specs(kind: FormKind) -> &'static [FormFieldSpec] {
    match kind {
        FormKind::Link => LINK_FIELDS,
        FormKind::Prompt => PROMPT_FIELDS,
        FormKind::Profile => PROFILE_FIELDS,
        FormKind::SignIn => SIGN_IN_FIELDS,
        FormKind::SignUp => SIGN_UP_FIELDS,
    }
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Link(_) => FormKind::Link,
            Self::Prompt(_) => FormKind::Prompt,
            Self::Profile(_) => FormKind::Profile,
            Self::SignIn(_) => FormKind::SignIn,
            Self::SignUp(_) => FormKind::SignUp,
        }
    }

    pub fn blank_for(kind: FormKind) -> Option<Self> {
        match kind {
            FormKind::Link => Some(Self::Link(LinkFormInput::blank())),
            FormKind::Prompt => Some(Self::Prompt(PromptFormInput::blank())),
            FormKind::Profile => Some(Self::Profile(ProfileFormInput::for_profile(None))),
            FormKind::SignIn => Some(Self::SignIn(SignInFormInput::default())),
            FormKind::SignUp => Some(Self::SignUp(SignUpFormInput::default())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Link(link) => link.validate(),
            Self::Prompt(prompt) => prompt.validate(),
            Self::Profile(profile) => profile.validate(),
            Self::SignIn(sign_in) => sign_in.validate(),
            Self::SignUp(sign_up) => sign_up.validate(),
        }
    }

    pub fn is_edit(&self) -> bool {
        match self {
            Self::Link(link) => link.editing.is_some(),
            Self::Prompt(prompt) => prompt.editing.is_some(),
            Self::Profile(_) | Self::SignIn(_) | Self::SignUp(_) => false,
        }
    }

    pub fn text_field(&self, key: &str) -> Option<&str> {
        let value = match (self, key) {
            (Self::Link(input), "url") => &input.url,
            (Self::Link(input), "name") => &input.name,
            (Self::Link(input), "description") => &input.description,
            (Self::Prompt(input), "title") => &input.title,
            (Self::Prompt(input), "description") => &input.description,
            (Self::Prompt(input), "prompt_text") => &input.prompt_text,
            (Self::Profile(input), "username") => &input.username,
            (Self::Profile(input), "avatar_url") => &input.avatar_url,
            (Self::SignIn(input), "username") => &input.username,
            (Self::SignIn(input), "password") => &input.password,
            (Self::SignUp(input), "username") => &input.username,
            (Self::SignUp(input), "email") => &input.email,
            (Self::SignUp(input), "password") => &input.password,
            (Self::SignUp(input), "confirm_password") => &input.confirm_password,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn text_field_mut(&mut self, key: &str) -> Result<&mut String> {
        let kind = self.kind();
        let value = match (self, key) {
            (Self::Link(input), "url") => &mut input.url,
            (Self::Link(input), "name") => &mut input.name,
            (Self::Link(input), "description") => &mut input.description,
            (Self::Prompt(input), "title") => &mut input.title,
            (Self::Prompt(input), "description") => &mut input.description,
            (Self::Prompt(input), "prompt_text") => &mut input.prompt_text,
            (Self::Profile(input), "username") => &mut input.username,
            (Self::Profile(input), "avatar_url") => &mut input.avatar_url,
            (Self::SignIn(input), "username") => &mut input.username,
            (Self::SignIn(input), "password") => &mut input.password,
            (Self::SignUp(input), "username") => &mut input.username,
            (Self::SignUp(input), "email") => &mut input.email,
            (Self::SignUp(input), "password") => &mut input.password,
            (Self::SignUp(input), "confirm_password") => &mut input.confirm_password,
            _ => bail!("{} form has no text field {key}", kind.label()),
        };
        Ok(value)
    }

    pub fn selector(&self, key: &str) -> Option<&TagSelector> {
        match (self, key) {
            (Self::Link(input), "model") => Some(&input.model),
            (Self::Link(input), "category") => Some(&input.category),
            (Self::Link(input), "tags") => Some(&input.tags),
            (Self::Prompt(input), "category") => Some(&input.category),
            (Self::Prompt(input), "tags") => Some(&input.tags),
            _ => None,
        }
    }

    pub fn selector_mut(&mut self, key: &str) -> Result<&mut TagSelector> {
        let kind = self.kind();
        match (self, key) {
            (Self::Link(input), "model") => Ok(&mut input.model),
            (Self::Link(input), "category") => Ok(&mut input.category),
            (Self::Link(input), "tags") => Ok(&mut input.tags),
            (Self::Prompt(input), "category") => Ok(&mut input.category),
            (Self::Prompt(input), "tags") => Ok(&mut input.tags),
            _ => bail!("{} form has no choice field {key}", kind.label()),
        }
    }

    /// Flip a boolean field. Returns the new value.
    pub fn toggle_field(&mut self, key: &str) -> Result<bool> {
        match (self, key) {
            (Self::Link(input), "is_popular") => {
                input.is_popular = !input.is_popular;
                Ok(input.is_popular)
            }
            (payload, _) => bail!("{} form has no toggle {key}", payload.kind().label()),
        }
    }

    /// Human-readable value of any field, with secrets masked.
    pub fn field_display(&self, spec: &FormFieldSpec) -> String {
        match spec.kind {
            FieldKind::Secret => "*".repeat(
                self.text_field(spec.key)
                    .map_or(0, |value| value.chars().count()),
            ),
            FieldKind::Text | FieldKind::Multiline => self
                .text_field(spec.key)
                .map(str::to_owned)
                .unwrap_or_default(),
            FieldKind::Choice => self
                .selector(spec.key)
                .map(|selector| join_list(selector.selected()))
                .unwrap_or_default(),
            FieldKind::Toggle => match self {
                Self::Link(input) if spec.key == "is_popular" => {
                    (if input.is_popular { "yes" } else { "no" }).to_owned()
                }
                _ => String::new(),
            },
        }
    }
}
