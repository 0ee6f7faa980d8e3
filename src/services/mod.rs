pub mod scoped_search;

pub use scoped_search::{OrderDetail, ScopedSearch};
