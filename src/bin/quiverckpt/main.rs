use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_doctor;
mod cmd_dump;
mod cmd_ls;
mod cmd_stat;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт: info.
    // Пример: RUST_LOG=debug ./quiverckpt ls --path ./ckpt
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Ok(false): команда отработала, но результат «неуспешный» (doctor нашёл ошибки).
fn run() -> Result<bool> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Ls { path, json } => cmd_ls::exec(path, json).map(|_| true),

        cli::Cmd::Dump { path, name, slice, json } =>
            cmd_dump::exec(path, name, slice, json).map(|_| true),

        cli::Cmd::Stat { path, json } => cmd_stat::exec(path, json).map(|_| true),

        cli::Cmd::Doctor { path, json } => cmd_doctor::exec(path, json),
    }
}
