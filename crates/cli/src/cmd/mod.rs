mod history;
mod run;

pub use history::{cmd_history_forget, cmd_history_show};
pub use run::{RunArgs, cmd_run};
