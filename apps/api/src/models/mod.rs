pub mod booking;
pub mod interviewer;
pub mod stage;
