pub mod bookings;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod overlap;
pub mod pipeline;
pub mod scoring;
pub mod sources;
