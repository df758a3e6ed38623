use std::ffi::OsString;
use std::io::Write;
use std::process;

use log::info;

mod cli;
mod config;
mod error;
mod wol;

use cli::Invocation;
use config::{Config, SystemResolver, Verbosity};
use wol::MagicPacket;

fn main() {
    if let Err(err) = run(std::env::args_os()) {
        eprintln!("wol: {err}");
        eprintln!("Try 'wol --help'");
        process::exit(1);
    }
}

/// Parse, validate, send. Nothing is sent unless every field checks out.
fn run<I, T>(args: I) -> error::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match cli::parse_from(args)? {
        Invocation::Help(text) => {
            println!("{}", text.trim_end());
            return Ok(());
        }
        Invocation::Version => {
            println!("{}", cli::version_text());
            return Ok(());
        }
        Invocation::Wake(args) => args,
    };

    init_logger(Verbosity::from_args(&args)?);

    let config = Config::from_args(&args, &SystemResolver)?;
    MagicPacket::new(config.mac).send_to(config.socket_addr())?;
    info!("Magic packet sent successfully");

    Ok(())
}

/// Bare messages on stdout, filtered by verbosity only.
fn init_logger(verbosity: Verbosity) {
    let _ = env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .target(env_logger::Target::Stdout)
        .try_init();
}
