//! Navigator: history plus guard, producing the view to render.
//!
//! DESIGN
//! ======
//! `open` records the entry first, then consults the guard. A redirect
//! replaces that entry, so the protected URL never stays in history for an
//! unauthenticated visitor. `follow` keeps the open page in step with auth
//! changes, which is how a sign-out on the dashboard lands on the login page
//! without a reload.

#[cfg(test)]
#[path = "navigator_test.rs"]
mod navigator_test;

use tracing::{debug, info};

use super::guard::{GuardDecision, RouteGuard};
use super::history::History;
use super::{Page, Route};

/// What the client shows for the current entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Loading,
    Page(Page),
    NotFound,
}

pub struct Navigator {
    guard: RouteGuard,
    history: History,
}

impl Navigator {
    /// Start at `start_path` and evaluate it once.
    #[must_use]
    pub fn new(guard: RouteGuard, start_path: &str) -> (Self, View) {
        let mut navigator = Self { guard, history: History::new(start_path) };
        let view = navigator.reconcile();
        (navigator, view)
    }

    /// Navigate to `path`, pushing a history entry.
    pub fn open(&mut self, path: &str) -> View {
        debug!(path, "navigating");
        self.history.push(path);
        self.reconcile()
    }

    /// Step back one entry and render it. `None` at the start of history.
    pub fn back(&mut self) -> Option<View> {
        self.history.back()?;
        Some(self.reconcile())
    }

    /// Re-apply the guard to the current entry.
    pub fn reconcile(&mut self) -> View {
        let route = Route::resolve(self.history.current());
        let page = match route {
            Route::NotFound => return View::NotFound,
            Route::Page(page) if !page.is_protected() => return View::Page(page),
            Route::Page(page) => page,
        };

        match self.guard.observe() {
            GuardDecision::Loading => View::Loading,
            GuardDecision::Allow => View::Page(page),
            GuardDecision::Redirect(redirect) => {
                info!(from = self.history.current(), to = %redirect.to, "redirecting unauthenticated visitor");
                if redirect.replace {
                    self.history.replace(redirect.to.as_str());
                } else {
                    self.history.push(redirect.to.as_str());
                }
                match Route::resolve(&redirect.to) {
                    Route::Page(target) if !target.is_protected() => View::Page(target),
                    Route::Page(_) => View::Loading,
                    Route::NotFound => View::NotFound,
                }
            }
        }
    }

    /// Wait for the next auth change and reconcile. `None` once the store
    /// is gone.
    pub async fn follow(&mut self) -> Option<View> {
        self.guard.next_decision().await?;
        Some(self.reconcile())
    }

    #[must_use]
    pub fn current_path(&self) -> &str {
        self.history.current()
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }
}
