pub mod analytics;
pub mod review;
pub mod study;
