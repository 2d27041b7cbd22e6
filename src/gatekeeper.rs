//! Per-request routing guard.
//!
//! [`gate`] decides for every navigable request whether it is served, sent to the
//! login screen, or sent to the caller's own dashboard. It is a pure function of the
//! path and the session, so it can run on every request concurrently without locks.

use std::borrow::Cow;

use crate::session::{Role, RoleTag, Session};

/// Where anonymous visitors of a protected area are sent. The login screen is the
/// site root.
pub const LOGIN_REDIRECT: &str = "/";
/// Fallback target for role values that name no known dashboard.
pub const ROOT: &str = "/";

/// Public entry paths that an authenticated user should never see again.
const ENTRY_PATHS: [&str; 2] = ["/", "/login"];

/// Infrastructure prefixes that never reach the gate.
const BYPASS_PREFIXES: [&str; 3] = ["/api", "/_next/static", "/_next/image"];
const FAVICON: &str = "/favicon.ico";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectTo(&'static str),
}

fn is_dot(segment: &str) -> bool {
    segment == "." || segment.eq_ignore_ascii_case("%2e")
}

fn is_dot_dot(segment: &str) -> bool {
    ["..", ".%2e", "%2e.", "%2e%2e"]
        .iter()
        .any(|dots| segment.eq_ignore_ascii_case(dots))
}

/// canonical_path
///
/// The path exactly as the page origin will resolve it: `.` and `..` segments
/// (plain or percent-encoded) are applied, repeated or backslash separators collapse
/// to one `/`, and a trailing slash is kept. Gating and forwarding must both use this
/// form; the raw path may name a different resource than it appears to.
///
/// Returns the input unchanged when it is already canonical.
pub fn canonical_path(path: &str) -> Cow<'_, str> {
    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in path.split(['/', '\\']) {
        trailing_slash = false;
        if segment.is_empty() || is_dot(segment) {
            trailing_slash = true;
        } else if is_dot_dot(segment) {
            segments.pop();
            trailing_slash = true;
        } else {
            segments.push(segment);
        }
    }

    let mut canonical = String::with_capacity(path.len());
    for segment in &segments {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if canonical.is_empty() || trailing_slash {
        canonical.push('/');
    }

    if canonical == path {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(canonical)
    }
}

/// True when `path` is `prefix` itself or continues it with a `/` segment.
/// `/admin` and `/admin/x` match `/admin`; `/adminfoo` does not.
pub fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn classify(path: &str) -> RouteClass {
    Role::ALL
        .into_iter()
        .find(|role| has_segment_prefix(path, role.area_prefix()))
        .map_or(RouteClass::Public, RouteClass::Protected)
}

/// API routes, build-internal assets and the favicon skip classification entirely.
pub fn is_bypassed(path: &str) -> bool {
    path == FAVICON
        || BYPASS_PREFIXES
            .iter()
            .any(|prefix| has_segment_prefix(path, prefix))
}

/// Total over every role tag; anything unrecognized lands on the site root.
pub fn dashboard_for(role: &RoleTag) -> &'static str {
    match role {
        RoleTag::Known(role) => role.dashboard(),
        RoleTag::Unrecognized(_) => ROOT,
    }
}

/// evaluate
///
/// The routing decision for a classified path:
/// 1. Protected area, anonymous session: login.
/// 2. Protected area, other role: that role's own dashboard.
/// 3. `/` or `/login` while authenticated: the role's dashboard.
/// 4. Everything else is allowed.
///
/// A redirect that would land on the requested path is dropped in favour of `Allow`,
/// which keeps an unrecognized role on `/` from looping.
pub fn evaluate(path: &str, session: &Session) -> GateDecision {
    let decision = match (classify(path), session) {
        (RouteClass::Protected(_), Session::Anonymous) => GateDecision::RedirectTo(LOGIN_REDIRECT),
        (RouteClass::Protected(required), Session::Authenticated { role, .. }) => {
            if role.known() == Some(required) {
                GateDecision::Allow
            } else {
                GateDecision::RedirectTo(dashboard_for(role))
            }
        }
        (RouteClass::Public, Session::Authenticated { role, .. }) if ENTRY_PATHS.contains(&path) => {
            GateDecision::RedirectTo(dashboard_for(role))
        }
        (RouteClass::Public, _) => GateDecision::Allow,
    };

    match decision {
        GateDecision::RedirectTo(target) if target == path => GateDecision::Allow,
        other => other,
    }
}

/// The full edge decision: bypassed infrastructure paths are always allowed,
/// everything else goes through [`evaluate`].
pub fn gate(path: &str, session: &Session) -> GateDecision {
    if is_bypassed(path) {
        return GateDecision::Allow;
    }
    evaluate(path, session)
}
