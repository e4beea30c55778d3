// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use crate::{Profile, Session, User, UserId};

/// Initialization that has not resolved by then stops reporting loading.
pub const LOADING_FAILSAFE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Authenticated(Session),
    Anonymous,
    TornDown,
}

/// Auth state owned by the application root and handed to whatever needs
/// the signed-in user.
#[derive(Debug, Clone)]
pub struct SessionContext {
    phase: SessionPhase,
    profile: Option<Profile>,
    started_at: Instant,
    loading: bool,
}

impl SessionContext {
    pub fn new(now: Instant) -> Self {
        Self {
            phase: SessionPhase::Initializing,
            profile: None,
            started_at: now,
            loading: true,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Resolve the initial phase from a restored session. Expired sessions
    /// count as anonymous.
    pub fn initialize(&mut self, restored: Option<Session>, now: OffsetDateTime) -> Result<()> {
        if self.phase != SessionPhase::Initializing {
            bail!("session already initialized");
        }
        self.phase = match restored {
            Some(session) if !session.is_expired(now) => SessionPhase::Authenticated(session),
            _ => SessionPhase::Anonymous,
        };
        self.loading = false;
        Ok(())
    }

    /// Returns true when the failsafe fired on this call.
    pub fn poll_failsafe(&mut self, now: Instant) -> bool {
        if self.loading && now.saturating_duration_since(self.started_at) >= LOADING_FAILSAFE {
            self.loading = false;
            return true;
        }
        false
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            SessionPhase::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|session| &session.user)
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user().map(|user| &user.id)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session().map(|session| session.access_token.as_str())
    }

    pub fn sign_in(&mut self, session: Session) -> Result<()> {
        if self.phase == SessionPhase::TornDown {
            bail!("session context is torn down");
        }
        self.profile = None;
        self.loading = false;
        self.phase = SessionPhase::Authenticated(session);
        Ok(())
    }

    /// Returns the user that was signed out, so callers can drop their
    /// cached data.
    pub fn sign_out(&mut self) -> Option<UserId> {
        let previous = self.user_id().cloned();
        if self.phase != SessionPhase::TornDown {
            self.phase = SessionPhase::Anonymous;
        }
        self.profile = None;
        self.loading = false;
        previous
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Store the fetched profile. A missing row is a normal new-user state.
    pub fn set_profile(&mut self, profile: Option<Profile>) {
        self.profile = match (profile, self.user_id()) {
            (Some(profile), Some(user_id)) if &profile.id == user_id => Some(profile),
            _ => None,
        };
    }

    /// Best display name: profile username, then sign-up metadata, then email.
    pub fn display_name(&self) -> Option<String> {
        if let Some(profile) = &self.profile {
            return Some(profile.username.clone());
        }
        let user = self.user()?;
        Some(user.username.clone().unwrap_or_else(|| user.email.clone()))
    }

    pub fn teardown(&mut self) {
        self.phase = SessionPhase::TornDown;
        self.profile = None;
        self.loading = false;
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == SessionPhase::TornDown
    }
}

#[cfg(test)]
mod tests {
    use super::{LOADING_FAILSAFE, SessionContext, SessionPhase};
    use crate::{Profile, Session, User, UserId};
    use std::time::{Duration, Instant};
    use time::OffsetDateTime;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: "access".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at,
            user: User {
                id: UserId::new("u1"),
                email: "ada@example.com".to_owned(),
                username: Some("ada".to_owned()),
            },
        }
    }

    #[test]
    fn initialize_with_session_authenticates() -> anyhow::Result<()> {
        let mut context = SessionContext::new(Instant::now());
        assert!(context.loading());
        context.initialize(Some(session(None)), OffsetDateTime::UNIX_EPOCH)?;
        assert!(!context.loading());
        assert_eq!(context.user_id(), Some(&UserId::new("u1")));
        assert_eq!(context.access_token(), Some("access"));
        assert!(context.initialize(None, OffsetDateTime::UNIX_EPOCH).is_err());
        Ok(())
    }

    #[test]
    fn expired_or_missing_session_is_anonymous() -> anyhow::Result<()> {
        let mut context = SessionContext::new(Instant::now());
        let now = OffsetDateTime::from_unix_timestamp(200)?;
        context.initialize(Some(session(Some(100))), now)?;
        assert_eq!(context.phase(), &SessionPhase::Anonymous);
        assert!(context.user().is_none());
        Ok(())
    }

    #[test]
    fn failsafe_stops_loading_after_five_seconds() {
        let start = Instant::now();
        let mut context = SessionContext::new(start);
        assert!(!context.poll_failsafe(start + Duration::from_secs(4)));
        assert!(context.loading());
        assert!(context.poll_failsafe(start + LOADING_FAILSAFE));
        assert!(!context.loading());
        assert!(!context.poll_failsafe(start + Duration::from_secs(10)));
        assert_eq!(context.phase(), &SessionPhase::Initializing);
    }

    #[test]
    fn profile_only_sticks_for_current_user() {
        let mut context = SessionContext::new(Instant::now());
        context.sign_in(session(None)).expect("sign in");
        context.set_profile(Some(Profile {
            id: UserId::new("someone-else"),
            username: "mallory".to_owned(),
            avatar_url: None,
            updated_at: None,
        }));
        assert!(context.profile().is_none());
        assert_eq!(context.display_name().as_deref(), Some("ada"));

        context.set_profile(Some(Profile {
            id: UserId::new("u1"),
            username: "lovelace".to_owned(),
            avatar_url: None,
            updated_at: None,
        }));
        assert_eq!(context.display_name().as_deref(), Some("lovelace"));
    }

    #[test]
    fn sign_out_clears_profile_and_reports_user() {
        let mut context = SessionContext::new(Instant::now());
        context.sign_in(session(None)).expect("sign in");
        context.set_profile(Some(Profile {
            id: UserId::new("u1"),
            username: "ada".to_owned(),
            avatar_url: None,
            updated_at: None,
        }));
        assert_eq!(context.sign_out(), Some(UserId::new("u1")));
        assert!(context.profile().is_none());
        assert_eq!(context.phase(), &SessionPhase::Anonymous);
        assert_eq!(context.sign_out(), None);
    }

    #[test]
    fn teardown_is_terminal() {
        let mut context = SessionContext::new(Instant::now());
        context.teardown();
        assert!(context.is_torn_down());
        assert!(context.sign_in(session(None)).is_err());
        context.sign_out();
        assert!(context.is_torn_down());
    }
}
