pub mod auth;
pub mod cards;
pub mod enrollments;
pub mod extract;
pub mod mastery;
pub mod predictions;
