use std::{convert::Infallible, fmt, str::FromStr};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

/// Cookie carrying the opaque session token, written by the login flow.
pub const TOKEN_COOKIE: &str = "token";
/// Cookie carrying the role tag (`admin`, `courier`, `customer`).
pub const ROLE_COOKIE: &str = "role";

/// Role
///
/// The three actors of the delivery platform. Each owns one protected area of the
/// site and one dashboard inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Courier,
    Customer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Courier, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Courier => "courier",
            Role::Customer => "customer",
        }
    }

    /// Path prefix of the area only this role may enter.
    pub fn area_prefix(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Courier => "/courier",
            Role::Customer => "/customer",
        }
    }

    pub fn dashboard(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Courier => "/courier/dashboard",
            Role::Customer => "/customer/dashboard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "courier" => Ok(Role::Courier),
            "customer" => Ok(Role::Customer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// RoleTag
///
/// The role cookie as received. Legacy or corrupted values are kept verbatim instead
/// of being rejected, so routing can fall back to the site root for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleTag {
    Known(Role),
    Unrecognized(String),
}

impl RoleTag {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Role>() {
            Ok(role) => RoleTag::Known(role),
            Err(UnknownRole(raw)) => RoleTag::Unrecognized(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleTag::Known(role) => role.as_str(),
            RoleTag::Unrecognized(raw) => raw,
        }
    }

    pub fn known(&self) -> Option<Role> {
        match self {
            RoleTag::Known(role) => Some(*role),
            RoleTag::Unrecognized(_) => None,
        }
    }
}

/// Session
///
/// The `(token, role)` pair identifying the current actor. Both-or-neither: a request
/// carrying only one of the two cookies, or an empty value, is `Anonymous`.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { token: String, role: RoleTag },
}

impl Session {
    pub fn from_parts(token: Option<&str>, role: Option<&str>) -> Self {
        match (token, role) {
            (Some(token), Some(role)) if !token.is_empty() && !role.is_empty() => {
                Session::Authenticated {
                    token: token.to_string(),
                    role: RoleTag::parse(role),
                }
            }
            _ => Session::Anonymous,
        }
    }

    pub fn authenticated(token: impl Into<String>, role: Role) -> Self {
        Session::Authenticated {
            token: token.into(),
            role: RoleTag::Known(role),
        }
    }

    /// Reads the `token` and `role` cookies from a request's cookie jar.
    pub fn from_cookies(jar: &CookieJar) -> Self {
        Self::from_parts(
            jar.get(TOKEN_COOKIE).map(|c| c.value()),
            jar.get(ROLE_COOKIE).map(|c| c.value()),
        )
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn role(&self) -> Option<&RoleTag> {
        match self {
            Session::Authenticated { role, .. } => Some(role),
            Session::Anonymous => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Authenticated { token, .. } => Some(token),
            Session::Anonymous => None,
        }
    }
}

// The token never reaches logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Anonymous => f.write_str("Anonymous"),
            Session::Authenticated { role, .. } => f
                .debug_struct("Authenticated")
                .field("token", &"<redacted>")
                .field("role", role)
                .finish(),
        }
    }
}

/// Session Extractor Implementation
///
/// Makes `Session` usable as a handler or middleware argument. Reading the session
/// never fails: missing, partial or empty cookies resolve to `Session::Anonymous`
/// and the gatekeeper decides what that means for the requested path.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Session::from_cookies(&jar))
    }
}
