pub mod ask;
pub mod generate_logs;
pub mod load;
pub mod provision;
pub mod search;
pub mod upload;
