mod cli;
mod core;
mod report;

fn main() -> std::process::ExitCode {
    cli::run::entry()
}
