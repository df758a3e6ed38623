use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{crate_name, crate_version, CommandFactory, Parser};

use crate::error::{Result, WolError};

/// Raw command line values. Conversion and validation happen in `config`.
#[derive(Parser, Debug, Default)]
#[command(
    name = "wol",
    about = "send a wake on lan command with a magic packet to the ip address provided",
    after_help = "Shows this help message if no options are provided",
    disable_version_flag = true,
    args_override_self = true
)]
pub struct Args {
    /// the address to reach the device (can be IPv4, IPv6 or an hostname), default=255.255.255.255
    #[arg(short, long, value_name = "ADDR")]
    pub address: Option<String>,

    /// the mac address of the device used for creating the magic packet
    #[arg(short, long, value_name = "MAC")]
    pub mac: Option<String>,

    /// port to use to send the magic packet, default=7
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<String>,

    /// sets the debug message verbosity, 0=silent, 1=normal, 2=debug, default=1
    #[arg(
        short = 'd',
        long = "debug-level",
        visible_short_alias = 'v',
        visible_alias = "verbosity",
        value_name = "N"
    )]
    pub debug_level: Option<String>,

    /// run silently without prompt except for errors, equivalent to verbosity level 0. This option
    /// overrides verbosity
    #[arg(short, long)]
    pub silent: bool,

    /// show version information and exit
    #[arg(long)]
    pub version: bool,
}

/// What the command line asks for.
#[derive(Debug)]
pub enum Invocation {
    Help(String),
    Version,
    Wake(Args),
}

/// Parses the full argument list, program name included. An empty argument
/// list is a request for help.
pub fn parse_from<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() <= 1 {
        return Ok(Invocation::Help(help_text()));
    }

    match Args::try_parse_from(args) {
        Ok(args) if args.version => Ok(Invocation::Version),
        Ok(args) => Ok(Invocation::Wake(args)),
        Err(err) if err.kind() == ErrorKind::DisplayHelp => Ok(Invocation::Help(help_text())),
        Err(err) => Err(WolError::Usage(usage_message(&err))),
    }
}

pub fn help_text() -> String {
    Args::command().render_help().to_string()
}

pub fn version_text() -> String {
    format!(
        "{} {}\nLicense {}: you are free to change and redistribute it.\n\
         There is NO WARRANTY, to the extent permitted by law.",
        crate_name!(),
        crate_version!(),
        env!("CARGO_PKG_LICENSE"),
    )
}

/// First line of a clap error without its "error: " prefix.
fn usage_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}
