pub mod fees;
pub mod types;
