//! Data model shared by the CRM core, the storage layer and the adapters.

pub mod deal;
pub mod promoter;
pub mod stage;

pub use deal::{Deal, DealView, MAX_AMOUNT_GBP};
pub use promoter::{Promoter, PromoterStatus, PromoterTier, UnknownTier};
pub use stage::Stage;
