//! zbx-migrate command line

mod cli;

use colored::Colorize;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}
