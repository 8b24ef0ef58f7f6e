//! Thin adapters over swappable external vendors.

pub mod analytics;
pub mod avatar;
pub mod search;

pub use analytics::{AnalyticsAdapter, AnalyticsError, CachedAnalytics, HttpAnalyticsAdapter};
pub use avatar::{AvatarClient, AvatarJob};
pub use search::{SearchClient, SearchHit, SearchResults};
