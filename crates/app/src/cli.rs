use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::control::{self, ControlCliArgs, ControlConfig, LoopMode};

#[derive(Debug, Parser)]
#[command(
    name = "gesture-volume",
    about = "Control the system volume with a thumb-index pinch",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the browser UI and drive the volume from the first detected hand.
    Run(ControlCliArgs),
    /// Draw hand skeletons and log thumb tips without touching the volume.
    Track(ControlCliArgs),
}

pub fn handle_commands(cli: Cli) -> Result<()> {
    let (args, mode) = match cli.command {
        Command::Run(args) => (args, LoopMode::Volume),
        Command::Track(args) => (args, LoopMode::Track),
    };
    let config = ControlConfig::try_from(args)?;
    control::run(config, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_select_mode() {
        let cli = Cli::try_parse_from(["gesture-volume", "track", "--camera", "1"]).unwrap();
        match cli.command {
            Command::Track(args) => assert_eq!(args.camera, 1),
            Command::Run(_) => panic!("expected track"),
        }
        let cli = Cli::try_parse_from(["gesture-volume", "run", "--volume", "dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Run(_)));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["gesture-volume"]).is_err());
    }
}
