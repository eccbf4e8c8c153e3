//! Client-side routing: the route table, history, and the auth guard.
//!
//! ARCHITECTURE
//! ============
//! `Route::resolve` maps a path to a page. `guard` turns an `AuthState` into a
//! decision for protected pages. `Navigator` combines both with a `History`
//! and reacts to auth changes while a page is open.

pub mod guard;
pub mod history;
pub mod navigator;

pub use guard::{GuardDecision, LOGIN_PATH, Redirect, RouteGuard};
pub use history::History;
pub use navigator::{Navigator, View};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Path of the default protected landing page.
pub const HOME_PATH: &str = "/";

/// Pages the client can render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Transactions,
    Login,
    Register,
}

impl Page {
    /// Pages that require a signed-in user.
    #[must_use]
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Dashboard | Self::Transactions)
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Transactions => "Transactions",
            Self::Login => "Login",
            Self::Register => "Register",
        }
    }
}

/// Result of matching a path against the route table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Page(Page),
    NotFound,
}

impl Route {
    /// Match `path`, ignoring any query string, fragment, or trailing slash.
    #[must_use]
    pub fn resolve(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Self::Page(Page::Dashboard),
            "/transactions" => Self::Page(Page::Transactions),
            "/login" => Self::Page(Page::Login),
            "/register" => Self::Page(Page::Register),
            _ => Self::NotFound,
        }
    }

    #[must_use]
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Page(page) if page.is_protected())
    }
}
