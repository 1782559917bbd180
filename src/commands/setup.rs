use anyhow::Result;
use declarative::ActionList;

use crate::Context;
use crate::cli::SetupArgs;
use crate::commands::{Project, execute, explain};
use crate::ui;

pub fn run(ctx: &Context, project: &Project, args: &SetupArgs) -> Result<()> {
    let env = &project.env;
    ui::header(&format!("Setup: {}", env.identity()));
    let transport = project.connect()?;

    let mut actions = ActionList::new();
    let mut reporter = ui::TerminalReporter::new(ctx.quiet);
    env.setup(&mut actions, &transport, &mut reporter).map_err(explain)?;

    execute(ctx, &mut actions, &transport, args.dry_run, args.yes)
}
