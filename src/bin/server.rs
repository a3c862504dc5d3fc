use byzantium::config::{Args, Config};
use byzantium::logger::Logger;
use byzantium::transport;
use clap::Parser;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let config = Config::from(&args);
    let bind_addr = args.bind_addr();

    Logger::new(args.verbose).info(format!(
        "byzantium starting: min_players={} lobby_time={}s timeout={}s starting_force={}",
        config.min_players, config.lobby_time, config.timeout, config.starting_force,
    ));

    match transport::run(config, &bind_addr, Logger::new(args.verbose)).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            Logger::new(args.verbose).warn(format!("failed to bind {bind_addr}: {err}"));
            std::process::ExitCode::FAILURE
        }
    }
}
