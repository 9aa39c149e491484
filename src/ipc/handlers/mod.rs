pub mod core;
pub mod courses;
pub mod enrollments;
pub mod grades;
pub mod reports;
pub mod students;
pub mod trimesters;
pub mod users;
