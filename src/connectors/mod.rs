//! Remote data sources that items are loaded from.

pub mod hubspot;

pub use hubspot::HubSpotLoader;
