//! Capability matrix for agents and administrators.
//!
//! [`can_perform`] is a pure predicate over actor, action and optional target. [`authorize`]
//! turns a denial into an [`AuthorizationError`].

use std::fmt;

use serde::Serialize;

use super::domain::{Actor, Property, PropertyStatus, Role, UserId};

/// Actions subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateProperty,
    EditProperty,
    SubmitProperty,
    ReviewProperty,
    MarkPropertySold,
    /// Status change whose state pair is not in the lifecycle table. Only the owner or an
    /// admin gets far enough to be told the transition is invalid.
    ChangePropertyStatus,
    DeleteProperty,
    ViewProperty,
    ViewReviewQueue,
    ViewUsers,
    ChangeUserRole,
    DeleteUser,
    ViewAccessLogs,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::CreateProperty => "create property",
            Action::EditProperty => "edit property",
            Action::SubmitProperty => "submit property for approval",
            Action::ReviewProperty => "approve or reject property",
            Action::MarkPropertySold => "mark property sold",
            Action::ChangePropertyStatus => "change property status",
            Action::DeleteProperty => "delete property",
            Action::ViewProperty => "view property",
            Action::ViewReviewQueue => "view approval queue",
            Action::ViewUsers => "view users",
            Action::ChangeUserRole => "change user role",
            Action::DeleteUser => "delete user",
            Action::ViewAccessLogs => "view access logs",
        }
    }

    /// Human readable description of what the actor would need.
    pub const fn required_capability(self) -> &'static str {
        match self {
            Action::CreateProperty => "an authenticated agent or admin",
            Action::EditProperty => "ownership or admin role, listing in draft or rejected",
            Action::SubmitProperty
            | Action::MarkPropertySold
            | Action::ChangePropertyStatus => "ownership of the listing or admin role",
            Action::ReviewProperty => "admin role",
            Action::DeleteProperty => "ownership of a draft listing or admin role",
            Action::ViewProperty => "a public listing, ownership, or admin role",
            Action::ChangeUserRole => "admin role, target must be another user",
            Action::ViewReviewQueue
            | Action::ViewUsers
            | Action::DeleteUser
            | Action::ViewAccessLogs => "admin role",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entity an action is aimed at.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Property(&'a Property),
    User(&'a UserId),
}

/// Raised when the actor lacks the capability for an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} may not {action}: requires {capability}")]
pub struct AuthorizationError {
    pub action: Action,
    pub role: Role,
    pub capability: &'static str,
}

pub fn can_perform(actor: &Actor, action: Action, target: Option<Target<'_>>) -> bool {
    let admin = actor.is_admin();

    match (action, target) {
        (Action::CreateProperty, _) => true,
        (Action::EditProperty, Some(Target::Property(property))) => {
            (admin || actor.owns(property)) && property.status.is_editable()
        }
        (
            Action::SubmitProperty | Action::MarkPropertySold | Action::ChangePropertyStatus,
            Some(Target::Property(property)),
        ) => admin || actor.owns(property),
        (Action::ReviewProperty, _) => admin,
        (Action::DeleteProperty, Some(Target::Property(property))) => {
            admin || (actor.owns(property) && property.status == PropertyStatus::Draft)
        }
        (Action::ViewProperty, Some(Target::Property(property))) => {
            admin || actor.owns(property) || property.status.is_public()
        }
        (Action::ChangeUserRole, Some(Target::User(user))) => admin && *user != actor.id,
        (Action::ViewReviewQueue | Action::ViewUsers | Action::ViewAccessLogs, _) => admin,
        (Action::DeleteUser, _) => admin,
        _ => false,
    }
}

pub fn authorize(
    actor: &Actor,
    action: Action,
    target: Option<Target<'_>>,
) -> Result<(), AuthorizationError> {
    if can_perform(actor, action, target) {
        Ok(())
    } else {
        Err(AuthorizationError {
            action,
            role: actor.role,
            capability: action.required_capability(),
        })
    }
}
