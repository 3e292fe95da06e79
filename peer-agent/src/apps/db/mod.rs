mod types;

mod bucket;

mod merge_operators;

mod builder;
pub use builder::Builder;

mod collection;
pub use collection::Collection;
