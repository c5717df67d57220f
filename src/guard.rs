//! Route guard for the HTML views.
//!
//! Each view is declared in a [`RouteTable`] with a `requires_auth` flag.
//! Every request is resolved against the table before it reaches a handler:
//! if any matched record requires auth and the session holds no identity,
//! the visitor is sent to the login view. There is no return-to-destination
//! after login.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::debug;

use crate::{session, AppResult};

pub const HOME: &str = "/";
pub const CHAT: &str = "/chat/{id}";
pub const LOGIN: &str = "/login";

#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub name: &'static str,
    pub path: &'static str,
    pub requires_auth: bool,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new(name: &'static str, path: &'static str) -> Self {
        Self { name, path, requires_auth: false, children: Vec::new() }
    }

    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn child(mut self, child: RouteRecord) -> Self {
        self.children.push(child);
        self
    }

    /// Chain of records from `self` down to the leaf matching `segments`.
    fn match_chain<'a>(&'a self, segments: &[&str]) -> Option<Vec<&'a RouteRecord>> {
        let pattern = split(self.path);
        if pattern.len() > segments.len() {
            return None;
        }
        if !pattern.iter().zip(segments).all(|(p, s)| segment_matches(p, s)) {
            return None;
        }

        let rest = &segments[pattern.len()..];
        for child in &self.children {
            if let Some(mut chain) = child.match_chain(rest) {
                chain.insert(0, self);
                return Some(chain);
            }
        }

        rest.is_empty().then(|| vec![self])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allowed { target: String },
    Redirected { target: String },
}

impl Navigation {
    pub fn target(&self) -> &str {
        match self {
            Navigation::Allowed { target } | Navigation::Redirected { target } => target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
    login_path: &'static str,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>, login_path: &'static str) -> Self {
        Self { routes, login_path }
    }

    /// Records matched by `path`, outermost first. Empty when nothing matches.
    pub fn matched(&self, path: &str) -> Vec<&RouteRecord> {
        let segments = split(path);
        self.routes
            .iter()
            .find_map(|route| route.match_chain(&segments))
            .unwrap_or_default()
    }

    pub fn requires_auth(&self, path: &str) -> bool {
        self.matched(path).iter().any(|record| record.requires_auth)
    }

    /// Decides where a navigation to `target` ends up.
    pub fn navigate(&self, target: &str, authenticated: bool) -> Navigation {
        let path = target.split(['?', '#']).next().unwrap_or(target);
        if self.requires_auth(path) && !authenticated {
            Navigation::Redirected { target: self.login_path.to_owned() }
        } else {
            Navigation::Allowed { target: target.to_owned() }
        }
    }
}

/// The views served by this application.
pub fn route_table() -> RouteTable {
    RouteTable::new(
        vec![
            RouteRecord::new("Home", HOME).requires_auth(),
            RouteRecord::new("Chat", CHAT).requires_auth(),
            RouteRecord::new("Login", LOGIN),
        ],
        LOGIN,
    )
}

pub async fn require_auth(
    State(routes): State<Arc<RouteTable>>,
    session: Session,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let authenticated = session::identity(&session).await?.is_some();
    let target = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_owned(), |pq| pq.as_str().to_owned());

    match routes.navigate(&target, authenticated) {
        Navigation::Allowed { .. } => Ok(next.run(request).await),
        Navigation::Redirected { target: login } => {
            debug!(from = %target, to = %login, "redirecting unauthenticated visitor");
            Ok(Redirect::to(&login).into_response())
        }
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    let is_param = pattern.starts_with(':') || (pattern.starts_with('{') && pattern.ends_with('}'));
    is_param || pattern == segment
}
