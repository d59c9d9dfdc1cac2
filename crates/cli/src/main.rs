use std::process::ExitCode;

fn main() -> ExitCode {
    evisa_cli::run()
}
