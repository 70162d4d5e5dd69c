// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{BookingAction, BookingError, BookingStatus};

/// The booking state machine:
///
/// ```text
/// BOOKED --cancel(owner)-->    CANCELLED
/// BOOKED --complete(doctor)--> COMPLETED
/// ```
///
/// Both targets are terminal. Annotating changes no status and is allowed
/// on any booking that was not cancelled.
pub struct BookingLifecycle;

impl BookingLifecycle {
    /// Status a booking ends up in after `action`, or `InvalidTransition`.
    pub fn next_status(current: BookingStatus, action: BookingAction) -> Result<BookingStatus, BookingError> {
        debug!("Validating {} on a {} booking", action, current);

        let next = match (current, action) {
            (BookingStatus::Booked, BookingAction::Cancel) => Some(BookingStatus::Cancelled),
            (BookingStatus::Booked, BookingAction::Reschedule) => Some(BookingStatus::Cancelled),
            (BookingStatus::Booked, BookingAction::Complete) => Some(BookingStatus::Completed),
            (BookingStatus::Booked | BookingStatus::Completed, BookingAction::Annotate) => Some(current),
            _ => None,
        };

        next.ok_or_else(|| {
            warn!("Invalid booking transition attempted: {} on {}", action, current);
            BookingError::InvalidTransition { from: current, action }
        })
    }
}
