use std::process::ExitCode;

fn main() -> ExitCode {
    plate_reader_lib::run()
}
