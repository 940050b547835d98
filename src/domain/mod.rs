pub mod model;
pub mod progression;
pub mod purchase;
pub mod rewards;
pub mod spin;
