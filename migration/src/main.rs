use migration::Migrator;
use std::{env, fs, path::Path, process::ExitCode};
use util::config::{LogConfig, database_file, database_path_from_env, database_url};
use util::logging::init_logging;

mod runner;

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = init_logging(&LogConfig::from_env());

    let db_path = match database_path_from_env() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    let url = database_url(&db_path);
    let db_file = database_file(&db_path);
    let args: Vec<String> = env::args().collect();

    let outcome = match (args.get(1).map(|s| s.as_str()), db_file) {
        (Some("clean"), Some(file)) => {
            remove_db_file(file);
            Ok(())
        }
        (Some("fresh"), Some(file)) => {
            remove_db_file(file);
            create_db_dir(file);
            runner::run_all_migrations(&url).await
        }
        (Some(cmd @ ("clean" | "fresh")), None) => {
            eprintln!("'{cmd}' needs DATABASE_PATH to be a file path, not a DSN");
            return ExitCode::FAILURE;
        }
        (_, file) => {
            if let Some(file) = file {
                create_db_dir(file);
            }
            runner::run_all_migrations(&url).await
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Migration failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn remove_db_file(db_path: &Path) {
    if db_path.exists() {
        match fs::remove_file(db_path) {
            Ok(()) => println!("Deleted DB: {}", db_path.display()),
            Err(err) => eprintln!("Failed to delete DB {}: {err}", db_path.display()),
        }
    } else {
        println!("DB file does not exist: {}", db_path.display());
    }
}

fn create_db_dir(db_path: &Path) {
    if let Some(parent) = db_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("Failed to create DB directory {}: {err}", parent.display());
        }
    }
}
