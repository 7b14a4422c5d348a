pub mod entry;
pub mod view;

pub use entry::{Category, Entry, Priority};
pub use view::{counts, is_overdue, select, View, ViewCounts};
