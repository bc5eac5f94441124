pub mod history;
pub mod plan;
pub mod reviews;
pub mod week;
