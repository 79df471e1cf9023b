use clap::{Args, Subcommand};

pub mod create;
pub mod subteam;

use crate::op::Op;

crate::command_enum! {
    (Create, create::Create),
    (Subteam, subteam::Subteam),
}

// Rename the generated Command to TeamCommand for clarity
pub type TeamCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Team {
    #[command(subcommand)]
    pub command: TeamCommand,
}

#[async_trait::async_trait]
impl Op for Team {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
