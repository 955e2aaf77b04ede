use tracing::{debug, info};

use super::claims::{decode_claims, Role};
use super::credentials::CredentialStore;

pub const LOGIN_PATH: &str = "/login";

/// Paths reachable without a credential.
pub const PUBLIC_PATHS: &[&str] = &[LOGIN_PATH, "/"];

/// Navigation parameters carried by a role-home redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    pub name: String,
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    RedirectLogin,
    RedirectRoleHome { role: Role, params: RouteParams },
}

impl Admission {
    /// Where the host should go instead, if anywhere.
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Admission::Allow => None,
            Admission::RedirectLogin => Some(LOGIN_PATH.to_string()),
            Admission::RedirectRoleHome { role, params } => role.home_path(&params.name),
        }
    }
}

/// Decides, before each navigation, whether it proceeds.
///
/// A credential that fails to decode, or names a role the client does not
/// know, is removed on the spot so the next navigation starts clean.
#[derive(Clone)]
pub struct RouteGuard {
    credentials: CredentialStore,
}

impl RouteGuard {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    pub fn check(&self, target: &str) -> Admission {
        let path = normalize_path(target);
        let token = self.credentials.token();

        if path == LOGIN_PATH {
            if let Some(token) = token {
                return self.admit_logged_in(&token);
            }
        }

        if token.is_none() && !PUBLIC_PATHS.contains(&path) {
            debug!(path, "No credential, redirecting to login");
            return Admission::RedirectLogin;
        }

        Admission::Allow
    }

    /// A logged-in user heading for the login page goes home instead.
    fn admit_logged_in(&self, token: &str) -> Admission {
        match decode_claims(token) {
            Ok(claims) => {
                let role = claims.role();
                let name = claims.subject_name();
                if role.is_recognized() && name.trim().is_empty() && role != Role::Admin {
                    info!(role = %role, "Credential names no subject, discarding it");
                    self.credentials.clear();
                    Admission::Allow
                } else if role.is_recognized() {
                    Admission::RedirectRoleHome {
                        role,
                        params: RouteParams { name },
                    }
                } else {
                    info!(role = %role, "Unrecognized role in credential, discarding it");
                    self.credentials.clear();
                    Admission::Allow
                }
            }
            Err(e) => {
                info!(error = %e, "Credential failed to decode, discarding it");
                self.credentials.clear();
                Admission::Allow
            }
        }
    }
}

/// Strip query, fragment and trailing slash: `/login/?next=x` is `/login`.
fn normalize_path(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    let path = &target[..end];
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
