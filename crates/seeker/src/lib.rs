pub mod agent;
pub mod clock;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod search_context;
pub mod store;
pub mod stream;
pub mod tools;
