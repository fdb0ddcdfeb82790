//! CLI tool to create a user directly in the database.
//!
//! Used to bootstrap the first admin without the admin key.
//!
//! Usage:
//!   cargo run --bin create-user -- --email admin@example.com --name "Ada Admin" --role admin
//!
//! The password is read from `--password` or `REGTRACK_NEW_USER_PASSWORD`.

use std::env;

use regtrack_lib::api::users::prepare_user;
use regtrack_lib::config::Config;
use regtrack_lib::db::DbPool;
use regtrack_lib::models::{AuthenticatedCaller, CreateUserRequest};

const PASSWORD_ENV: &str = "REGTRACK_NEW_USER_PASSWORD";

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut email: Option<String> = None;
    let mut name: Option<String> = None;
    let mut password: Option<String> = env::var(PASSWORD_ENV).ok();
    let mut phone: Option<String> = None;
    let mut role: Option<String> = None;
    let mut projects: Vec<i64> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if matches!(flag, "--help" | "-h") {
            print_usage();
            return;
        }

        i += 1;
        let Some(value) = args.get(i).cloned() else {
            eprintln!("Missing value for {}", flag);
            print_usage();
            std::process::exit(1);
        };

        match flag {
            "--email" | "-e" => email = Some(value),
            "--name" | "-n" => name = Some(value),
            "--password" | "-p" => password = Some(value),
            "--phone" => phone = Some(value),
            "--role" | "-r" => role = Some(value),
            "--project" => match value.parse::<i64>() {
                Ok(id) => projects.push(id),
                Err(_) => fail(format!("Invalid project id '{}'", value)),
            },
            _ => {
                eprintln!("Unknown argument: {}", flag);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(email), Some(name)) = (email, name) else {
        eprintln!("Error: --email and --name are required");
        print_usage();
        std::process::exit(1);
    };
    let Some(password) = password else {
        fail(format!("--password or {} is required", PASSWORD_ENV));
    };

    let request = CreateUserRequest {
        full_name: name,
        email,
        password,
        phone,
        role,
        projects,
    };
    let new_user = prepare_user(request, &AuthenticatedCaller::bootstrap_admin())
        .unwrap_or_else(|e| fail(e));

    // Load config and initialize database
    let config = Config::from_env().unwrap_or_else(|e| fail(format!("loading config: {}", e)));
    let pool = DbPool::new(&config)
        .await
        .unwrap_or_else(|e| fail(format!("connecting to database: {}", e)));
    if let Err(e) = pool.run_migrations().await {
        fail(format!("running migrations: {}", e));
    }

    let user = pool.create_user(new_user).await.unwrap_or_else(|e| fail(e));

    println!();
    println!("════════════════════════════════════════════════════════════════");
    println!("  User Created");
    println!("════════════════════════════════════════════════════════════════");
    println!();
    println!("  ID:     {}", user.id);
    println!("  Name:   {}", user.name);
    println!("  Email:  {}", user.email);
    println!("  Role:   {}", user.role);
    println!();
    println!("  Log in with POST /api/auth/login");
    println!("════════════════════════════════════════════════════════════════");
    println!();
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage: create-user --email <email> --name <name> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --email, -e       Login email (required)");
    eprintln!("  --name, -n        Display name; must match the owner name the parser reports (required)");
    eprintln!("  --password, -p    Password (or set {})", PASSWORD_ENV);
    eprintln!("  --phone           Phone number");
    eprintln!("  --role, -r        Role: admin, manager, user (default: user)");
    eprintln!("  --project         Assign to a project id (repeatable)");
    eprintln!("  --help, -h        Show this help");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  create-user --email ada@example.com --name \"Ada Admin\" --role admin");
    eprintln!("  create-user -e bob@example.com -n \"Bob\" --project 1 --project 2");
    eprintln!();
}
