pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod classes;
pub mod core;
pub mod enrollments;
pub mod professors;
pub mod students;
