mod size_limit;
mod time_limit;

pub use self::size_limit::SizeLimit;
pub use self::time_limit::TimeLimit;
