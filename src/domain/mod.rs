pub mod access;
pub mod booking;
pub mod listing;
pub mod payment;
pub mod review;
pub mod user;

pub use access::*;
pub use booking::*;
pub use listing::*;
pub use payment::*;
pub use review::*;
pub use user::*;
