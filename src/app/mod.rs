pub mod links;
pub mod market_service;
