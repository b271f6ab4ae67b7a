pub mod config;
pub mod history;
pub mod methods;
pub mod timer;

mod context;
