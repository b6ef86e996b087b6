// Tue Jan 13 2026 - Alex

pub mod local;
pub mod preload;
pub mod timer;
pub mod traits;

pub use local::LocalHost;
pub use timer::TimerQueue;
pub use traits::{
    FileSource, Host, Interceptor, InvocationArgs, InvocationContext, InvocationListener,
    ModuleResolver, RepeatingTask, Scheduler, Task,
};
