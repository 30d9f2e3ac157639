//! The unit of work executed by pool workers.

use super::error::TaskError;

/// An opaque unit of work.
///
/// `execute` consumes the task, so once a worker holds it nobody else can.
/// Errors are reported to the worker for logging only; a task that needs to
/// answer its submitter does so itself (e.g. through a channel it carries).
pub trait Task: Send + 'static {
    fn execute(self: Box<Self>) -> Result<(), TaskError>;
}

/// Boxed task as stored in the queue.
pub type BoxedTask = Box<dyn Task>;

impl<F> Task for F
where
    F: FnOnce() -> Result<(), TaskError> + Send + 'static,
{
    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        (*self)()
    }
}

/// Box a closure as a task.
pub fn task_fn<F>(f: F) -> BoxedTask
where
    F: FnOnce() -> Result<(), TaskError> + Send + 'static,
{
    Box::new(f)
}
