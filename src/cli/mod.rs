pub mod act;
pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod run;
pub mod runtime;
pub mod snapshot;

pub use app::run;
