use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_commit;
mod cmd_inspect;
mod cmd_recover;
mod cmd_segments;
mod cmd_status;
mod cmd_truncate;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — warn (CLI печатает сам).
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Segments { path, page_size, json } =>
            cmd_segments::exec(path, page_size, json),

        cli::Cmd::Inspect { path, xid, page_size, json } =>
            cmd_inspect::exec(path, xid, page_size, json),

        cli::Cmd::Status { path, json } =>
            cmd_status::exec(path, json),

        cli::Cmd::Recover { path, tracking, json } =>
            cmd_recover::exec(path, tracking, json),

        cli::Cmd::Commit { path, ts, origin, subxacts } =>
            cmd_commit::exec(path, ts, origin, subxacts),

        cli::Cmd::Truncate { path, oldest_xid } =>
            cmd_truncate::exec(path, oldest_xid),
    }
}
