use anyhow::Result;
use colored::Colorize;
use declarative::Api;
use environ::params::Namespace;
use environ::{DbRef, Environment, Resource};
use serde_json::{Map, Value};

use crate::Context;
use crate::commands::Project;
use crate::ui;

pub fn run(ctx: &Context, project: &Project) -> Result<()> {
    let env = &project.env;
    ui::header(&format!("Environment: {}", env.title().unwrap_or(env.identity())));
    ui::kv("file", env.identity());
    if let Some(code) = env.code() {
        ui::kv("code", code);
    }

    print_connection(env);
    print_params(env);

    ui::section("Databases");
    if env.databases().is_empty() {
        ui::dim("none");
    }
    for db in env.databases() {
        println!("  {} {}", "•".blue(), db.name.bold());
        if let Some(id) = &db.id {
            ui::kv("  id", id);
        }
        ui::kv("  forests", &db.forests.join(", "));
        for (key, target) in db.references() {
            if let Some(target) = target {
                ui::kv(&format!("  {key}"), &describe(env, target, &db.name));
            }
        }
        print_body(ctx, &db.body(env));
    }

    ui::section("Servers");
    if env.servers().is_empty() {
        ui::dim("none");
    }
    for server in env.servers() {
        println!("  {} {} ({})", "•".blue(), server.name.bold(), server.kind());
        if let Some(port) = server.port() {
            ui::kv("  port", &port.to_string());
        }
        ui::kv("  group", &server.group);
        ui::kv("  content", &describe(env, &server.content, &server.name));
        let modules = server
            .modules
            .as_ref()
            .map_or_else(|| "(file system)".to_string(), |m| describe(env, m, &server.name));
        ui::kv("  modules", &modules);
        print_body(ctx, &server.body(env));
    }

    if !env.sources().is_empty() {
        ui::section("Sources");
        for source in env.sources() {
            println!("  {} {} ({})", "•".blue(), source.name.bold(), source.kind());
            ui::kv("  dir", source.dir());
            ui::kv("  prefix", source.prefix());
            for (label, patterns) in [
                ("  include", source.include()),
                ("  exclude", source.exclude()),
                ("  garbage", source.garbage()),
                ("  collections", source.collections()),
            ] {
                if !patterns.is_empty() {
                    ui::kv(label, &patterns.join(", "));
                }
            }
            if let Some(target) = source.target() {
                ui::kv("  target", target);
            }
            let permissions: Vec<_> = source
                .permissions()
                .iter()
                .map(|p| format!("{}:{}", p.role, p.capability))
                .collect();
            if !permissions.is_empty() {
                ui::kv("  permissions", &permissions.join(", "));
            }
        }
    }

    print_resources(ctx, "MIME Types", env.mime_types());
    print_resources(ctx, "Roles", env.roles());
    print_resources(ctx, "Users", env.users());
    Ok(())
}

fn print_connection(env: &Environment) {
    let connection = env.connection();
    ui::section("Connection");
    ui::kv("host", &connection.host);
    ui::kv("user", connection.user.as_deref().unwrap_or("(none)"));
    let password = if connection.password.is_some() { "********" } else { "(none)" };
    ui::kv("password", password);
    for api in Api::ALL {
        let settings = env.api(api);
        let scheme = if settings.ssl { "https" } else { "http" };
        ui::kv(api.name(), &format!("{scheme} :{} /{}", settings.port, settings.root));
    }
}

fn print_params(env: &Environment) {
    let user: Vec<_> = env
        .params()
        .iter()
        .filter(|(key, _)| key.namespace == Namespace::User)
        .collect();
    if user.is_empty() {
        return;
    }
    ui::section("Parameters");
    for (key, value) in user {
        ui::kv(&key.name, value);
    }
}

fn print_resources(ctx: &Context, title: &str, resources: &[Resource]) {
    if resources.is_empty() {
        return;
    }
    ui::section(title);
    for resource in resources {
        println!("  {} {}", "•".blue(), resource.name.bold());
        let mut body = resource.props.render();
        if let Some(password) = body.get_mut("password") {
            *password = Value::from("********");
        }
        print_body(ctx, &body);
    }
}

/// Reference target with its kind
fn describe(env: &Environment, target: &DbRef, owner: &str) -> String {
    let name = env.reference_name(target, owner);
    match target {
        DbRef::Managed(_) => name.to_string(),
        DbRef::System(_) => format!("{name} (system)"),
        DbRef::Myself => format!("{name} (self)"),
    }
}

/// Rendered property body, with -v
fn print_body(ctx: &Context, body: &Map<String, Value>) {
    if ctx.verbose == 0 {
        return;
    }
    let rendered = serde_json::to_string_pretty(body).unwrap_or_default();
    for line in rendered.lines() {
        ui::dim(&format!("    {line}"));
    }
}
