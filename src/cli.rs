use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("camcommander")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fetches webcam images from remote camera hosts and ships them to their destinations.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to $CP_CONFIG_FILE)")
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("run").about("Runs the broker, watchers and fetchers until interrupted (default)"))
        .subcommand(Command::new("check").about("Checks every source once and ships new images, then exits"))
        .subcommand(Command::new("poke-relays").about("Pokes the web relays scheduled for the current minute"))
}
