//! Command implementations and the project plumbing they share

pub mod load;
pub mod setup;
pub mod show;

use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::ActionList;
use environ::{Environment, Overrides};
use std::path::PathBuf;

use crate::Context;
use crate::cli::ProjectArgs;
use crate::config::UserConfig;
use crate::loader::{DEFAULT_ENV, FsLoader};
use crate::transport::HttpTransport;
use crate::ui;

/// A compiled environment and where it came from
pub struct Project {
    pub dir: PathBuf,
    pub env: Environment,
    pub config: UserConfig,
}

impl Project {
    /// Compile the environment selected on the command line
    pub fn open(args: &ProjectArgs) -> Result<Self> {
        let dir = PathBuf::from(shellexpand::tilde(&args.dir).as_ref());
        let config = UserConfig::load()?;
        let overrides = overrides(args, &config)?;

        let env = if let Some(file) = &args.file {
            let identity = file.display().to_string();
            Environment::compile(&FsLoader, &identity, &overrides).map_err(explain)?
        } else if let Some(name) = &args.env {
            let identity = FsLoader::env_path(&dir, name);
            Environment::compile(&FsLoader, &identity, &overrides).map_err(explain)?
        } else {
            let identity = FsLoader::env_path(&dir, DEFAULT_ENV);
            match Environment::probe(&FsLoader, &identity, &overrides).map_err(explain)? {
                Some(env) => env,
                None => bail!("No environment given (use --env or --file) and no {identity}"),
            }
        };
        Ok(Self { dir, env, config })
    }

    /// HTTP transport to the environment's host, asking for a missing password
    pub fn connect(&self) -> Result<HttpTransport> {
        let connection = self.env.connection();
        let prompted = match (&connection.user, &connection.password) {
            (Some(user), None) => Some(
                dialoguer::Password::new()
                    .with_prompt(format!("Password for {user}@{}", connection.host))
                    .interact()
                    .context("Could not read password")?,
            ),
            _ => None,
        };
        Ok(HttpTransport::new(&self.env, prompted.as_deref(), &self.config.http))
    }
}

/// Build the parameter tiers from the command line and the user config
pub fn overrides(args: &ProjectArgs, config: &UserConfig) -> Result<Overrides> {
    let mut overrides = Overrides {
        defaults: config.defaults(),
        ..Overrides::default()
    };
    for param in &args.params {
        let Some((name, value)) = param.split_once('=') else {
            bail!("Invalid parameter {param:?}, expected name=value");
        };
        overrides.params.insert(name.trim().to_string(), value.to_string());
    }
    let forced = [("@host", &args.host), ("@user", &args.user), ("@password", &args.password)];
    for (key, value) in forced {
        if let Some(value) = value {
            overrides.forced.insert(key.to_string(), value.clone());
        }
    }
    Ok(overrides)
}

/// Turn an environment error into a reported one, with its advice
pub fn explain(err: environ::Error) -> anyhow::Error {
    let category = err.category();
    ui::dim(category.advice());
    anyhow::Error::new(err).context(category.description())
}

/// Show a plan, confirm it, run it and report the outcome
pub fn execute(ctx: &Context, actions: &mut ActionList, transport: &HttpTransport, dry_run: bool, yes: bool) -> Result<()> {
    ui::print_plan(actions);
    if actions.is_empty() {
        return Ok(());
    }
    if dry_run {
        println!();
        ui::info("Dry run, nothing executed");
        return Ok(());
    }
    if !yes && !confirm_proceed()? {
        ui::info("Cancelled");
        return Ok(());
    }

    let mut reporter = ui::TerminalReporter::new(ctx.quiet);
    reporter.start_execution(actions.len());
    let counts = actions.execute(transport, &mut reporter);
    reporter.finish_execution();
    ui::print_summary(actions);

    if let Some(failure) = actions.error() {
        log::debug!("{} of {} actions done", counts.done, counts.total());
        bail!("{}: {}", failure.message.replace('\t', " "), failure.error);
    }
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}
