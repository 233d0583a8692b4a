//! HTTP API
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | POST | `/start` | start (or, for merge workflows, continue) a thread |
//! | GET | `/pending/:thread_id` | the decision a thread waits for |
//! | POST | `/resume/:thread_id` | supply the decision |
//! | GET | `/threads` | all threads |
//! | GET/DELETE | `/threads/:thread_id` | snapshot / delete |
//! | GET | `/threads/:thread_id/history` | checkpoints, newest first |
//! | POST | `/threads/:thread_id/state` | edit state, optionally as a step |
//! | POST | `/threads/:thread_id/proceed` | continue a ready thread |
//! | GET | `/workflows`, `/health` | discovery |

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use routes::{create_router, AppState};
