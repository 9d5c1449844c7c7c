pub mod awattar;
pub mod price_source;
pub mod secret;
