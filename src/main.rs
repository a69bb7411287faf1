use std::process::ExitCode;

use aula::ui::output;

fn main() -> ExitCode {
    match aula::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
