pub mod clock;
pub mod hunger;

pub use clock::utc_now;
pub use hunger::{advance_last_fed, clamp_hunger, hunger_decrement};
