//! Listing status state machine and field rules.

use chrono::{DateTime, Utc};

use super::authorization::{authorize, Action, AuthorizationError, Target};
use super::domain::{Actor, Property, PropertyDraft, PropertyId, PropertyStatus, Role, UserId};

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Edges of the lifecycle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// `draft` or `rejected` into `pending_approval`.
    Submit,
    Approve,
    Reject,
    MarkSold,
}

impl TransitionKind {
    pub const fn audit_action(self) -> &'static str {
        match self {
            TransitionKind::Submit => "property.submit",
            TransitionKind::Approve => "property.approve",
            TransitionKind::Reject => "property.reject",
            TransitionKind::MarkSold => "property.mark_sold",
        }
    }
}

/// Looks up the state pair in the transition table.
pub fn transition_kind(from: PropertyStatus, to: PropertyStatus) -> Option<TransitionKind> {
    use PropertyStatus::*;

    match (from, to) {
        (Draft | Rejected, PendingApproval) => Some(TransitionKind::Submit),
        (PendingApproval, Active) => Some(TransitionKind::Approve),
        (PendingApproval, Rejected) => Some(TransitionKind::Reject),
        (Active, Sold) => Some(TransitionKind::MarkSold),
        _ => None,
    }
}

/// Capability checked before the table lookup. Review edges need the admin role even for the
/// owner; pairs outside the table only need ownership, so the owner learns the move is invalid.
fn required_action(from: PropertyStatus, to: PropertyStatus) -> Action {
    match (from, to) {
        (_, PropertyStatus::PendingApproval) => Action::SubmitProperty,
        (PropertyStatus::PendingApproval, PropertyStatus::Active | PropertyStatus::Rejected) => {
            Action::ReviewProperty
        }
        (_, PropertyStatus::Sold) => Action::MarkPropertySold,
        _ => Action::ChangePropertyStatus,
    }
}

/// Field-level failure, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),
    #[error("cannot move listing from {from} to {to} as {role}")]
    InvalidTransition {
        from: PropertyStatus,
        to: PropertyStatus,
        role: Role,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Validated transition, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub kind: TransitionKind,
    pub from: PropertyStatus,
    pub to: PropertyStatus,
    reason: Option<String>,
}

impl TransitionPlan {
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Produces the listing after the transition. `rejection_reason` is set only when
    /// entering `rejected` and cleared on every other edge.
    pub fn apply(&self, property: &Property, now: DateTime<Utc>) -> Property {
        let mut next = property.clone();
        next.status = self.to;
        next.rejection_reason = match self.kind {
            TransitionKind::Reject => self.reason.clone(),
            TransitionKind::Submit | TransitionKind::Approve | TransitionKind::MarkSold => None,
        };
        next.updated_at = now;
        next
    }
}

/// Checks authorization, then the state table, then the fields the edge requires.
pub fn plan_transition(
    actor: &Actor,
    property: &Property,
    to: PropertyStatus,
    reason: Option<&str>,
) -> Result<TransitionPlan, TransitionError> {
    let from = property.status;

    authorize(
        actor,
        required_action(from, to),
        Some(Target::Property(property)),
    )?;

    let kind = transition_kind(from, to).ok_or(TransitionError::InvalidTransition {
        from,
        to,
        role: actor.role,
    })?;

    let reason = match kind {
        TransitionKind::Submit => {
            validate_submission(property)?;
            None
        }
        TransitionKind::Reject => {
            let reason = reason.map(str::trim).unwrap_or_default();
            if reason.is_empty() {
                return Err(ValidationError::new(
                    "rejection_reason",
                    "a reason is required when rejecting a listing",
                )
                .into());
            }
            Some(reason.to_string())
        }
        TransitionKind::Approve | TransitionKind::MarkSold => None,
    };

    Ok(TransitionPlan {
        kind,
        from,
        to,
        reason,
    })
}

/// Fields required before a listing may enter review.
pub fn validate_submission(property: &Property) -> Result<(), ValidationError> {
    validate_title(&property.title)?;
    validate_address(&property.address)?;
    validate_price(property.price)
}

/// Rules every stored listing satisfies, whatever its status.
pub fn validate_listing(property: &Property) -> Result<(), ValidationError> {
    validate_title(&property.title)?;
    validate_address(&property.address)?;
    validate_price(property.price)?;

    if let Some(description) = &property.description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(ValidationError::new(
                "description",
                format!("must be at most {DESCRIPTION_MAX_CHARS} characters"),
            ));
        }
    }

    for (field, value) in property.attributes.named() {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::new(field, "must be a non-negative number"));
            }
        }
    }

    if property.images.iter().any(|image| image.trim().is_empty()) {
        return Err(ValidationError::new(
            "images",
            "image references must not be blank",
        ));
    }

    Ok(())
}

/// Same rules as [`validate_listing`], applied to raw input before an id is assigned.
pub fn validate_draft(draft: &PropertyDraft) -> Result<(), ValidationError> {
    let probe = Property::from_draft(
        PropertyId(String::new()),
        UserId(String::new()),
        draft.clone(),
        Utc::now(),
    );
    validate_listing(&probe)
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let length = title.trim().chars().count();
    if length < TITLE_MIN_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at least {TITLE_MIN_CHARS} characters"),
        ));
    }
    if length > TITLE_MAX_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at most {TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

fn validate_address(address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::new("address", "is required"));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::new("price", "must be greater than zero"));
    }
    Ok(())
}
