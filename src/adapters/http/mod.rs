//! HTTP orchestration hop: the axum service that runs jobs and the reqwest
//! client the queue consumer calls it with.

mod client;
mod server;

pub use client::HttpTrigger;
pub use server::{router, TRANSCODE_ROUTE};
