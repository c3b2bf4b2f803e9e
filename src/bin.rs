use clap::ArgMatches;
use clap_complete::{generate, Shell};
use droidrunner::prelude::*;
use droidrunner::{cli, dr_info, dr_run};
use std::io;

fn main() -> DrResult<()> {
    let args = cli::droidrunner().get_matches();

    match &args.subcommand() {
        Some(("run", cmd_args)) => dr_run::run(cmd_args),
        Some(("info", cmd_args)) => dr_info::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(DrError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(DrError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> DrResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| DrError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::droidrunner();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
