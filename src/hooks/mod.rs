// Tue Jan 13 2026 - Alex

pub mod error;
pub mod listener;
pub mod loader;

pub use error::HookError;
pub use listener::LoadListener;
pub use loader::LoaderHooks;
