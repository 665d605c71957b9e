//! The navigation guard predicate.
//!
//! Authentication is checked strictly before role: an anonymous visitor
//! asking for an admin route is sent to login, never told "access denied".

use super::routes::{RouteMeta, HOME, LOGIN};
use crate::auth::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Not authenticated; go to the named route
    RedirectTo(&'static str),
    /// Authenticated without the required role; notify, then go to the named route
    Denied { redirect_to: &'static str },
}

pub fn authorize(meta: &RouteMeta, session: Option<&Session>) -> Decision {
    let needs_session = meta.requires_auth || meta.requires_admin;

    let Some(session) = session else {
        return if needs_session {
            Decision::RedirectTo(LOGIN)
        } else {
            Decision::Allow
        };
    };

    if meta.requires_admin && !session.user.is_admin() {
        return Decision::Denied { redirect_to: HOME };
    }

    Decision::Allow
}
