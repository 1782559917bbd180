use anyhow::Result;
use declarative::ActionList;
use environ::LoadTarget;

use crate::Context;
use crate::cli::LoadArgs;
use crate::commands::{Project, execute, explain};
use crate::ui;
use crate::walk::ProjectFiles;

pub fn run(ctx: &Context, project: &Project, args: &LoadArgs) -> Result<()> {
    let target = match (&args.db, &args.srv) {
        (Some(db), _) => LoadTarget::Database(db),
        (None, Some(srv)) => LoadTarget::Server(srv),
        (None, None) => LoadTarget::Default,
    };
    ui::header(&format!("Load: {}", args.source));
    let transport = project.connect()?;
    let files = ProjectFiles::new(&project.dir);

    let mut actions = ActionList::new();
    let mut reporter = ui::TerminalReporter::new(ctx.quiet);
    project
        .env
        .load(&args.source, target, &files, &mut actions, &transport, &mut reporter)
        .map_err(explain)?;

    execute(ctx, &mut actions, &transport, args.dry_run, args.yes)
}
