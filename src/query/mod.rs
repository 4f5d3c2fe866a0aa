pub mod filter;
pub mod period;

pub use filter::RecordFilter;
pub use period::Period;
