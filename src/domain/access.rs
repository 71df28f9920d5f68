//! Permission evaluation as a plain function over (actor, resource, action).
//! Reads are public; writes require ownership or the Admin role.

use crate::domain::{Booking, Listing, Review, User, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Borrowed view of the resource a request wants to touch.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    Listing(&'a Listing),
    Booking(&'a Booking),
    Review(&'a Review),
}

impl ResourceRef<'_> {
    fn owner_id(&self) -> uuid::Uuid {
        match self {
            ResourceRef::Listing(l) => l.host_id,
            ResourceRef::Booking(b) => b.customer_id,
            ResourceRef::Review(r) => r.customer_id,
        }
    }
}

pub fn permitted(actor: &User, resource: ResourceRef<'_>, action: Action) -> bool {
    if actor.role == UserRole::Admin {
        return true;
    }
    if action == Action::Read {
        return true;
    }
    actor.id == resource.owner_id()
}
