//! Which screen the client shows, and when it is allowed to change.
//!
//! `SavedCharts` is the only guarded view. Asking for it without a session
//! leaves the current view in place and raises a login prompt instead.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::auth::{SessionEvent, SessionManager, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Calculator,
    Login,
    Register,
    SavedCharts,
}

impl View {
    pub const ALL: [View; 4] = [
        View::Calculator,
        View::Login,
        View::Register,
        View::SavedCharts,
    ];

    pub fn requires_session(self) -> bool {
        matches!(self, View::SavedCharts)
    }

    pub fn name(self) -> &'static str {
        match self {
            View::Calculator => "calculator",
            View::Login => "login",
            View::Register => "register",
            View::SavedCharts => "charts",
        }
    }

    /// Work to start on entering this view
    fn entry_effect(self) -> Option<Effect> {
        match self {
            View::SavedCharts => Some(Effect::FetchCharts),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown view '{0}' (expected calculator, login, register, or charts)")]
pub struct UnknownView(pub String);

impl FromStr for View {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "calculator" | "calc" => Ok(View::Calculator),
            "login" => Ok(View::Login),
            "register" => Ok(View::Register),
            "charts" | "saved" | "saved_charts" => Ok(View::SavedCharts),
            other => Err(UnknownView(other.to_string())),
        }
    }
}

/// What the shell should render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    View(View),
    /// The current view stays underneath; accepting moves to `Login`
    LoginPrompt { then: View },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    FetchCharts,
}

/// Outcome of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Switch { to: View, effect: Option<Effect> },
    PromptLogin { then: View },
}

/// The navigation table. Pure so it can be checked case by case.
pub fn transition(current: View, target: View, authenticated: bool) -> Transition {
    if target.requires_session() && !authenticated {
        debug!(%current, %target, "Guarded view needs a session");
        return Transition::PromptLogin { then: target };
    }
    Transition::Switch {
        to: target,
        effect: target.entry_effect(),
    }
}

#[derive(Debug)]
pub struct ViewRouter {
    current: View,
    prompt: Option<View>,
    /// Guarded view to open once a login succeeds
    pending: Option<View>,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRouter {
    pub fn new() -> Self {
        Self {
            current: View::Calculator,
            prompt: None,
            pending: None,
        }
    }

    pub fn current(&self) -> View {
        self.current
    }

    pub fn pending(&self) -> Option<View> {
        self.pending
    }

    pub fn screen(&self) -> Screen {
        match self.prompt {
            Some(then) => Screen::LoginPrompt { then },
            None => Screen::View(self.current),
        }
    }

    /// Request a view. Returns the effect to run if the switch happened.
    pub fn navigate(&mut self, target: View, session: &SessionManager) -> Option<Effect> {
        match transition(self.current, target, session.is_authenticated()) {
            Transition::Switch { to, effect } => {
                self.switch(to);
                // Moving between the login and register forms keeps the parked target
                if !matches!(to, View::Login | View::Register) {
                    self.pending = None;
                }
                effect
            }
            Transition::PromptLogin { then } => {
                self.prompt = Some(then);
                None
            }
        }
    }

    /// Follow the prompt to the login form. False if no prompt was showing.
    pub fn accept_prompt(&mut self) -> bool {
        match self.prompt.take() {
            Some(then) => {
                self.pending = Some(then);
                self.switch(View::Login);
                true
            }
            None => false,
        }
    }

    pub fn dismiss_prompt(&mut self) {
        self.prompt = None;
    }

    /// A local login or logout happened
    pub fn handle_session_event(&mut self, event: &SessionEvent) -> Option<Effect> {
        match event {
            SessionEvent::LoggedIn(_) => {
                let target = self.pending.take().unwrap_or(View::Calculator);
                self.switch(target);
                target.entry_effect()
            }
            SessionEvent::LoggedOut(reason) => {
                // A failed attempt on the login or register form keeps the parked target
                if !matches!(self.current, View::Login | View::Register) {
                    self.pending = None;
                }
                if self.current.requires_session() {
                    debug!(?reason, "Leaving guarded view after logout");
                    self.switch(View::Calculator);
                }
                None
            }
        }
    }

    /// Another tab changed the session. Returns true if the view was forced.
    pub fn handle_session_state(&mut self, state: &SessionState) -> bool {
        if state.is_authenticated() || !self.current.requires_session() {
            return false;
        }
        debug!(view = %self.current, "Session ended elsewhere, leaving guarded view");
        self.switch(View::Calculator);
        true
    }

    /// Registration succeeded; the account still has to log in
    pub fn on_registered(&mut self) {
        self.switch(View::Login);
    }

    fn switch(&mut self, to: View) {
        if self.current != to {
            debug!(from = %self.current, %to, "Switching view");
        }
        self.current = to;
        self.prompt = None;
    }
}
