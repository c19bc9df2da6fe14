pub mod time;

use std::future::Future;

use tokio::{
    runtime::{Handle, Runtime},
    task::block_in_place,
};

/// Random id used for event and log records.
pub fn longid() -> String {
    nanoid::nanoid!()
}

/// Guid-shaped id used for sequences, enrollments and step runs.
pub fn guid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Drive a future to completion on `runtime`, also from inside a worker thread.
pub fn block_on<F: Future>(
    runtime: &Runtime,
    fut: F,
) -> F::Output {
    if Handle::try_current().is_ok() {
        block_in_place(|| runtime.block_on(fut))
    } else {
        runtime.block_on(fut)
    }
}
