pub mod coverage;
pub mod dispatch;
pub mod neighbors;
pub mod path;
pub mod rebuild;
pub mod schema;
pub mod stats;
pub mod sync;
pub mod viz;
