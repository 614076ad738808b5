mod io;
mod shell;

pub use shell::{CLEAR_COMMAND, InteractiveShell, QUIT_COMMAND};
