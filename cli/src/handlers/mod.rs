mod fetch;

pub use fetch::handle_fetch;
