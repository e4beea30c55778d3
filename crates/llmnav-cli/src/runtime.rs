// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use llmnav_app::{
    FormPayload, Link, LinkFieldUpdate, LinkId, Prompt, PromptId, PromptQuery, Session,
    SessionContext, SessionPhase,
};
use llmnav_store::{
    AuthService, DataAccess, FetchTicket, RemoteStore, SaveOutcome, SessionFile, remote_message,
};
use llmnav_tui::{AccountView, AppRuntime, BulkDeleteOutcome, InternalEvent};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Wires the data-access layer and the session context into the TUI.
pub struct StoreRuntime<S> {
    data: DataAccess<S>,
    session: SessionContext,
    session_file: Option<SessionFile>,
    clipboard: Option<arboard::Clipboard>,
    /// Cache tickets of prompt fetches running on worker threads.
    pending_prompts: HashMap<u64, FetchTicket>,
}

impl<S: RemoteStore + AuthService> StoreRuntime<S> {
    /// `session_file` is `None` when nothing should persist, e.g. demo mode.
    pub fn new(store: S, session_file: Option<SessionFile>) -> Self {
        Self {
            data: DataAccess::new(store),
            session: SessionContext::new(Instant::now()),
            session_file,
            clipboard: None,
            pending_prompts: HashMap::new(),
        }
    }

    /// Resolve the stored session, dropping it when the backend no longer
    /// accepts its token.
    pub fn restore_session(&mut self) -> Result<()> {
        let restored = self
            .session_file
            .as_ref()
            .and_then(SessionFile::load)
            .filter(|session| self.token_still_valid(session));
        self.session
            .initialize(restored, OffsetDateTime::now_utc())?;

        if self.session.session().is_none() {
            self.forget_stored_session();
            return Ok(());
        }
        self.activate_session();
        Ok(())
    }

    /// Sign in with fixed credentials. Demo mode calls this before the
    /// first frame, while the session context is still initializing.
    pub fn sign_in_with(&mut self, username: &str, password: &str) -> Result<()> {
        let session = self.data.store_mut().sign_in(username, password)?;
        if self.session.phase() != &SessionPhase::Initializing {
            return self.adopt_session(session);
        }
        self.session
            .initialize(Some(session), OffsetDateTime::now_utc())?;
        self.activate_session();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.session.teardown();
    }

    fn token_still_valid(&self, session: &Session) -> bool {
        match self.data.store().current_user(&session.access_token) {
            Ok(user) => user.id == session.user.id,
            Err(error) => {
                warn!(error = %error, "stored session rejected");
                false
            }
        }
    }

    fn forget_stored_session(&self) {
        if let Some(file) = &self.session_file
            && let Err(error) = file.clear()
        {
            warn!(error = %error, "could not remove stored session");
        }
    }

    fn adopt_session(&mut self, session: Session) -> Result<()> {
        if let Some(file) = &self.session_file {
            file.save(&session)?;
        }
        self.session.sign_in(session)?;
        self.activate_session();
        Ok(())
    }

    /// Point the data layer at the signed-in user and fetch the profile.
    fn activate_session(&mut self) {
        let user_id = self.session.user_id().cloned();
        let token = self.session.access_token().map(str::to_owned);
        self.data.set_user(user_id.clone(), token.as_deref());
        if let Some(user_id) = user_id {
            info!(user = %user_id, "signed in");
        }
        match self.data.fetch_profile() {
            Ok(profile) => self.session.set_profile(profile),
            Err(error) => warn!(error = %error, "profile fetch failed"),
        }
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard> {
        if self.clipboard.is_none() {
            let clipboard = arboard::Clipboard::new()
                .context("open clipboard -- a desktop session is required to copy")?;
            self.clipboard = Some(clipboard);
        }
        self.clipboard
            .as_mut()
            .ok_or_else(|| anyhow!("clipboard unavailable"))
    }
}

fn remote(error: anyhow::Error) -> anyhow::Error {
    anyhow!(remote_message(&error))
}

fn send_prompts(
    tx: &Sender<InternalEvent>,
    request_id: u64,
    result: Result<Vec<Prompt>, String>,
) -> Result<()> {
    tx.send(InternalEvent::PromptsLoaded { request_id, result })
        .map_err(|_| anyhow!("prompt event channel closed"))
}

impl<S: RemoteStore + AuthService> AppRuntime for StoreRuntime<S> {
    fn account(&mut self) -> AccountView {
        if self.session.poll_failsafe(Instant::now()) {
            warn!("session initialization timed out");
        }
        AccountView {
            loading: self.session.loading(),
            user: self.session.user().cloned(),
            profile: self.session.profile().cloned(),
            display_name: self.session.display_name(),
        }
    }

    fn load_links(&mut self) -> Result<Vec<Link>> {
        self.data.links().map_err(remote)
    }

    fn refresh_links(&mut self) -> Result<Vec<Link>> {
        self.data.refresh_links().map_err(remote)
    }

    fn load_prompts(&mut self, query: &PromptQuery) -> Result<Vec<Prompt>> {
        self.data.prompts(query).map_err(remote)
    }

    fn invalidate_prompts(&mut self) {
        self.data.invalidate_prompts();
    }

    /// Serve fresh cache hits at once. Otherwise read on a worker thread
    /// when the store offers a detached reader, so the UI keeps drawing
    /// while the request is in flight.
    fn spawn_prompt_fetch(
        &mut self,
        request_id: u64,
        query: &PromptQuery,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        if let Some(prompts) = self.data.fresh_prompts(query) {
            return send_prompts(&tx, request_id, Ok(prompts));
        }
        let Some(reader) = self.data.store().prompt_reader() else {
            let result = self.load_prompts(query).map_err(|error| error.to_string());
            return send_prompts(&tx, request_id, result);
        };
        let Some(ticket) = self.data.begin_prompt_fetch(query) else {
            return send_prompts(&tx, request_id, Ok(Vec::new()));
        };
        debug!(request_id, generation = ticket.generation, "prompt fetch started");
        self.pending_prompts.insert(request_id, ticket);

        let query = query.clone();
        thread::spawn(move || {
            let result = reader
                .read_prompts(&query)
                .map_err(|error| remote_message(&error));
            let _ = tx.send(InternalEvent::PromptsLoaded { request_id, result });
        });
        Ok(())
    }

    fn prompts_arrived(&mut self, request_id: u64, result: &Result<Vec<Prompt>, String>) {
        let Some(ticket) = self.pending_prompts.remove(&request_id) else {
            return;
        };
        match result {
            Ok(prompts) => {
                if !self.data.complete_prompt_fetch(&ticket, prompts.clone()) {
                    debug!(request_id, "superseded prompt result not cached");
                }
            }
            Err(error) => warn!(request_id, error = %error, "prompt fetch failed"),
        }
    }

    fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
        payload.validate()?;

        match payload {
            FormPayload::Link(input) => {
                let (link, outcome) = self.data.save_link(input).map_err(remote)?;
                let created = outcome == SaveOutcome::Created;
                info!(link = %link.id, created, "link saved");
            }
            FormPayload::Prompt(input) => {
                let (prompt, outcome) = self.data.save_prompt(input).map_err(remote)?;
                let created = outcome == SaveOutcome::Created;
                info!(prompt = %prompt.id, created, "prompt saved");
            }
            FormPayload::Profile(input) => {
                let profile = self.data.update_profile(input).map_err(remote)?;
                self.session.set_profile(Some(profile));
            }
            FormPayload::SignIn(input) => {
                let session = self
                    .data
                    .store_mut()
                    .sign_in(input.username.trim(), &input.password)?;
                self.adopt_session(session)?;
            }
            FormPayload::SignUp(input) => {
                let session = self.data.store_mut().sign_up(
                    input.email.trim(),
                    &input.password,
                    input.username.trim(),
                )?;
                match session {
                    Some(session) => self.adopt_session(session)?,
                    None => info!("sign up pending email confirmation"),
                }
            }
        }
        Ok(())
    }

    fn update_link_field(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link> {
        self.data.update_link_field(id, update).map_err(|error| {
            warn!(link = %id, column = update.column().as_str(), error = %error, "cell update failed");
            remote(error)
        })
    }

    fn delete_link(&mut self, id: &LinkId) -> Result<()> {
        self.data.delete_link(id).map_err(remote)
    }

    fn delete_links(&mut self, ids: &[LinkId]) -> Result<BulkDeleteOutcome> {
        let report = self.data.bulk_delete_links(ids).map_err(remote)?;
        Ok(BulkDeleteOutcome {
            requested: report.requested,
            deleted: report.deleted.len(),
            summary: report.summary(),
        })
    }

    fn delete_prompt(&mut self, id: &PromptId) -> Result<()> {
        self.data.delete_prompt(id).map_err(remote)
    }

    fn sign_out(&mut self) -> Result<()> {
        if let Some(current) = self.session.session().cloned()
            && let Err(error) = self.data.store_mut().sign_out(&current)
        {
            warn!(error = %error, "remote sign out failed");
        }
        if let Some(user) = self.session.sign_out() {
            info!(user = %user, "signed out");
        }
        self.data.set_user(None, None);
        self.pending_prompts.clear();
        if let Some(file) = &self.session_file {
            file.clear()?;
        }
        Ok(())
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        self.clipboard()?
            .set_text(text.to_owned())
            .context("copy to clipboard")
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        open::that(url).with_context(|| format!("open {url} in browser"))
    }
}
