mod completion;
mod options;
mod scheduled;

pub use completion::Completion;
pub use options::SubmitOptions;
pub use scheduled::{ExecuteFn, OperationFuture};

pub(crate) use completion::CompletionSource;
pub(crate) use scheduled::{into_execute_fn, ScheduledOperation};
