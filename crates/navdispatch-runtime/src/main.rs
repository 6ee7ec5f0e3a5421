mod cli;
mod cmd_codec;
mod cmd_decide;
mod cmd_replay;
mod context;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(context::log_filter(cli.verbose)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Command::Decide(opts) => {
            let config = context::load_config(cli.config.as_deref())?;
            let host = context::load_host(cli.host.as_deref())?;
            let report = cmd_decide::run(&opts, config, host)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        cli::Command::Replay(opts) => {
            let failed = cmd_replay::run(&opts.files, opts.all)?;
            if failed > 0 {
                std::process::exit(1);
            }
        }
        cli::Command::Decode(opts) => {
            println!("{}", cmd_codec::decode(&opts.url)?);
        }
        cli::Command::Encode => {
            println!("{}", cmd_codec::encode_stdin()?);
        }
    }

    Ok(())
}
