//! tafview Environment Abstraction Layer
//!
//! Lets the playback scheduler run against **Production** time (tokio) or a
//! **Simulated** virtual clock. Everything the scheduler does with time goes
//! through [`ReplayContext`]:
//! - `now()` for elapsed time
//! - `sleep()` for pause polling and inter-frame delays
//!
//! # Example
//!
//! ```ignore
//! use tafview_env::{ReplayContext, TokioContext};
//!
//! async fn tick<Ctx: ReplayContext>(ctx: &Ctx) {
//!     ctx.sleep(Duration::from_millis(100)).await;
//! }
//! ```

mod context;
mod sim;
mod tokio_impl;

pub use context::ReplayContext;
pub use sim::SimContext;
pub use tokio_impl::TokioContext;
