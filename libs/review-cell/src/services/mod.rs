pub mod rating;
pub mod review;

pub use rating::RatingAggregator;
pub use review::ReviewService;
