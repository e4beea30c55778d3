// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};

use crate::{AppMode, FormKind, FormPayload, TabKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: TabKind,
    pub status_line: Option<String>,
    pub form_payload: Option<FormPayload>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: TabKind::Links,
            status_line: None,
            form_payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    SetActiveTab(TabKind),
    EnterEditMode,
    ExitToNav,
    OpenForm(FormKind),
    SetFormPayload(FormPayload),
    CloseForm,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    FormChanged,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn with_tab(tab: TabKind) -> Self {
        Self {
            active_tab: tab,
            ..Self::default()
        }
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SetActiveTab(tab) => {
                if self.active_tab == tab {
                    return Vec::new();
                }
                self.active_tab = tab;
                vec![AppEvent::TabChanged(tab)]
            }
            AppCommand::EnterEditMode => {
                self.mode = AppMode::Edit;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                self.form_payload = None;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenForm(kind) => {
                self.mode = AppMode::Form(kind);
                self.form_payload = FormPayload::blank_for(kind);
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status(&format!("new {}", kind.label())),
                ]
            }
            AppCommand::SetFormPayload(payload) => {
                let kind = payload.kind();
                self.mode = AppMode::Form(kind);
                self.form_payload = Some(payload);
                vec![AppEvent::ModeChanged(self.mode), AppEvent::FormChanged]
            }
            AppCommand::CloseForm => {
                self.form_payload = None;
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode), AppEvent::FormChanged]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    /// The open form's payload, checked before any remote call is made.
    pub fn validated_form_payload(&self) -> Result<FormPayload> {
        let payload = self
            .form_payload
            .clone()
            .ok_or_else(|| anyhow!("no form is open -- press a to add a row"))?;
        payload.validate()?;
        Ok(payload)
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::{AppMode, FormKind, FormPayload, TabKind};

    #[test]
    fn tab_rotation_wraps() {
        let mut state = AppState::with_tab(TabKind::Profile);

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Links);
        assert_eq!(events, vec![AppEvent::TabChanged(TabKind::Links)]);

        state.dispatch(AppCommand::PrevTab);
        assert_eq!(state.active_tab, TabKind::Profile);
    }

    #[test]
    fn set_active_tab_is_quiet_when_unchanged() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::SetActiveTab(TabKind::Links)).is_empty());
        assert_eq!(
            state.dispatch(AppCommand::SetActiveTab(TabKind::Prompts)),
            vec![AppEvent::TabChanged(TabKind::Prompts)]
        );
    }

    #[test]
    fn open_form_installs_blank_payload() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::OpenForm(FormKind::Prompt));
        assert_eq!(state.mode, AppMode::Form(FormKind::Prompt));
        assert_eq!(
            state.form_payload.as_ref().map(FormPayload::kind),
            Some(FormKind::Prompt)
        );
        assert_eq!(
            events,
            vec![
                AppEvent::ModeChanged(AppMode::Form(FormKind::Prompt)),
                AppEvent::StatusUpdated("new prompt".to_owned()),
            ]
        );
    }

    #[test]
    fn validated_payload_surfaces_first_error() {
        let mut state = AppState::default();
        let err = state
            .validated_form_payload()
            .expect_err("no form open");
        assert!(err.to_string().contains("no form is open"));

        state.dispatch(AppCommand::OpenForm(FormKind::Link));
        let err = state
            .validated_form_payload()
            .expect_err("blank link form is invalid");
        assert_eq!(err.to_string(), "URL is required");
    }

    #[test]
    fn mode_transitions_and_status() {
        let mut state = AppState::default();

        state.dispatch(AppCommand::EnterEditMode);
        assert_eq!(state.mode, AppMode::Edit);

        state.dispatch(AppCommand::OpenForm(FormKind::SignIn));
        assert_eq!(state.mode, AppMode::Form(FormKind::SignIn));

        state.dispatch(AppCommand::CloseForm);
        assert_eq!(state.mode, AppMode::Nav);
        assert!(state.form_payload.is_none());

        state.dispatch(AppCommand::SetStatus("Updated".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("Updated"));
        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert!(state.status_line.is_none());
    }
}
