mod batching;
mod http;
mod queue;
mod rate_limit;
mod retry;
pub(crate) mod worker;

pub(crate) use http::CollectorTransport;
pub(crate) use queue::PendingQueue;
pub(crate) use retry::Transport;
pub(crate) use worker::{Worker, WorkerCommand, run_worker};
