pub mod bookings;
pub mod listings;
pub mod payments;
pub mod reviews;
pub mod root;
pub mod users;
