mod minmax;
mod seglist;

pub use self::minmax::MinMaxFilter;
pub use self::seglist::{Ordered, SegList};
