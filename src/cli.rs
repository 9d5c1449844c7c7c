mod awattar;
mod battery;
mod heartbeat;
mod hunt;
mod manual;
mod schedule;
mod scout;

use clap::{Parser, Subcommand};

use crate::{
    cli::{hunt::HuntArgs, scout::ScoutArgs},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub async fn run(self) -> Result {
        match self.command {
            Command::Hunt(args) => args.run().await,
            Command::Scout(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: keep the prices fresh and steer the battery every control cycle.
    #[clap(name = "hunt")]
    Hunt(Box<HuntArgs>),

    /// Fetch the prices once and show the schedule without steering anything.
    #[clap(name = "scout")]
    Scout(Box<ScoutArgs>),
}
