//! Authorization policy.
//!
//! Every access decision in the service goes through [`authorize`]: it takes
//! who is asking, what they are touching and what they want to do, and
//! answers allow or deny. It performs no IO; handlers load the target first
//! and pass its ownership facts in.

use uuid::Uuid;

use crate::error::ApiError;
use crate::resources::ResourceKind;

pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
pub const PRIVATE_VIEW_MESSAGE: &str = "You do not have permission to view this portfolio.";

/// The authenticated caller, reduced to what policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub is_staff: bool,
}

/// Which rows a list query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    Owner(Uuid),
}

impl ListScope {
    pub fn admits(&self, owner: Uuid) -> bool {
        match self {
            ListScope::All => true,
            ListScope::Owner(id) => *id == owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    Delete,
    /// Restricted visibility/slug update on a template portfolio.
    PublicUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Collection(ResourceKind),
    Record {
        kind: ResourceKind,
        owner: Uuid,
        is_public: bool,
    },
    Users,
    User(Uuid),
    Roles,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(&'static str),
}

impl From<Denied> for ApiError {
    fn from(denied: Denied) -> Self {
        match denied {
            Denied::Unauthenticated => ApiError::unauthenticated(),
            Denied::Forbidden(msg) => ApiError::Forbidden(msg.to_string()),
        }
    }
}

fn signed_in(requester: Option<&Requester>) -> Result<&Requester, Denied> {
    requester.ok_or(Denied::Unauthenticated)
}

fn staff_only(requester: Option<&Requester>) -> Result<(), Denied> {
    if signed_in(requester)?.is_staff {
        Ok(())
    } else {
        Err(Denied::Forbidden(FORBIDDEN_MESSAGE))
    }
}

fn owner_or_staff(requester: Option<&Requester>, owner: Uuid) -> Result<(), Denied> {
    let requester = signed_in(requester)?;
    if requester.is_staff || requester.id == owner {
        Ok(())
    } else {
        Err(Denied::Forbidden(FORBIDDEN_MESSAGE))
    }
}

pub fn authorize(
    requester: Option<&Requester>,
    target: &Target,
    action: Action,
) -> Result<(), Denied> {
    match (*target, action) {
        (Target::Collection(kind), Action::List) if kind.is_catalog() => Ok(()),
        (Target::Collection(_), Action::List) => signed_in(requester).map(|_| ()),
        (Target::Collection(kind), Action::Create) if kind.is_catalog() => staff_only(requester),
        (Target::Collection(_), Action::Create) => signed_in(requester).map(|_| ()),

        (Target::Record { kind, .. }, Action::Retrieve) if kind.is_catalog() => Ok(()),
        (Target::Record { kind, owner, is_public }, Action::Retrieve) if kind.has_visibility() => {
            // Only the owner sees a private record; staff get no bypass here.
            if is_public || requester.is_some_and(|r| r.id == owner) {
                Ok(())
            } else {
                Err(Denied::Forbidden(PRIVATE_VIEW_MESSAGE))
            }
        }
        (Target::Record { owner, .. }, Action::Retrieve) => owner_or_staff(requester, owner),
        (Target::Record { kind, .. }, Action::Update | Action::Delete) if kind.is_catalog() => {
            staff_only(requester)
        }
        (Target::Record { owner, .. }, Action::Update | Action::Delete) => {
            owner_or_staff(requester, owner)
        }
        (Target::Record { kind, owner, .. }, Action::PublicUpdate) if kind.has_visibility() => {
            if signed_in(requester)?.id == owner {
                Ok(())
            } else {
                Err(Denied::Forbidden(FORBIDDEN_MESSAGE))
            }
        }

        (Target::Users, Action::List | Action::Create) => staff_only(requester),
        (Target::User(id), Action::Retrieve | Action::Update | Action::Delete) => {
            owner_or_staff(requester, id)
        }

        (Target::Roles, Action::List | Action::Retrieve) => signed_in(requester).map(|_| ()),
        (Target::Roles, Action::Create | Action::Update | Action::Delete) => staff_only(requester),

        _ => Err(Denied::Forbidden(FORBIDDEN_MESSAGE)),
    }
}

/// Rows a list endpoint returns for this caller. Call after `authorize`.
pub fn list_scope(requester: Option<&Requester>, kind: ResourceKind) -> ListScope {
    match requester {
        _ if kind.is_catalog() => ListScope::All,
        Some(r) if r.is_staff => ListScope::All,
        Some(r) => ListScope::Owner(r.id),
        // Unreachable after authorize; an empty owner matches nothing.
        None => ListScope::Owner(Uuid::nil()),
    }
}

/// Same rule for the users collection: staff see everyone, others themselves.
pub fn user_scope(requester: &Requester) -> ListScope {
    if requester.is_staff {
        ListScope::All
    } else {
        ListScope::Owner(requester.id)
    }
}
