use clap::Subcommand;

use super::act::ActArgs;
use super::run::RunArgs;
use super::snapshot::SnapshotArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Pursue a goal with the planner loop
    Run(RunArgs),

    /// Print the interactive elements of a page
    Snapshot(SnapshotArgs),

    /// Run a single action against a page
    Act(ActArgs),
}
