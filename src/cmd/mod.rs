//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled     |
//! |-----------|----------------------|
//! | `project` | `Init`               |
//! | `run`     | `Run`                |
//! | `status`  | `Status`, `Stages`   |

pub mod project;
pub mod run;
pub mod status;

pub use project::cmd_init;
pub use run::cmd_run;
pub use status::{cmd_stages, cmd_status};
