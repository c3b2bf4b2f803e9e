//! Main `DroidRunner` binary command line arguments options.
//!
//! This module declares a function to build the `clap` command line
//! arguments parser, so that it can be used from other places than the
//! main binary, such as from the shell completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input APK file")
}

fn arg_activity() -> Arg {
    Arg::new("activity")
        .short('a')
        .long("activity")
        .action(ArgAction::Set)
        .help("Fully qualified activity class to launch (defaults to the manifest launcher)")
}

fn arg_display() -> [Arg; 2] {
    [
        Arg::new("width")
            .long("width")
            .action(ArgAction::Set)
            .value_parser(value_parser!(i32))
            .default_value("480")
            .help("Window width in pixels"),
        Arg::new("height")
            .long("height")
            .action(ArgAction::Set)
            .value_parser(value_parser!(i32))
            .default_value("800")
            .help("Window height in pixels"),
    ]
}

fn arg_tap() -> Arg {
    Arg::new("tap")
        .long("tap")
        .action(ArgAction::Append)
        .help("Tap at 'x,y' window coordinates after launch (repeatable, in order)")
}

fn arg_screenshot() -> Arg {
    Arg::new("screenshot")
        .short('o')
        .long("screenshot")
        .action(ArgAction::Set)
        .help("Write a PNG screenshot to this path before exiting")
}

fn arg_locale() -> Arg {
    Arg::new("locale")
        .long("locale")
        .action(ArgAction::Set)
        .help("Resource locale, e.g. 'es' or 'es-ES'")
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

#[must_use]
pub fn droidrunner() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Load an APK, launch an activity, replay taps, screenshot")
                .arg(arg_debug())
                .arg(arg_verbose())
                .arg(arg_input())
                .arg(arg_activity())
                .args(arg_display())
                .arg(arg_tap())
                .arg(arg_screenshot())
                .arg(arg_locale()),
        )
        .subcommand(
            Command::new("info")
                .about("Print a JSON summary of an APK: manifest, dex and translation stats")
                .arg(arg_debug())
                .arg(arg_verbose())
                .arg(arg_input())
                .arg(arg_filter_class()),
        )
        .subcommand(
            Command::new("gen-completions")
                .about("Generate shell completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Target shell"),
                ),
        )
}
