//! Command-line front end. Reads a backup file, asks for the password via the
//! environment or stdin, and prints the decoded accounts.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;

use otpauth_decrypt::archive::Unarchiver;
use otpauth_decrypt::backup::decode_backup;
use otpauth_decrypt::config::{load_config, RuntimeConfig};
use otpauth_decrypt::otp::{Folder, UriBuilder};
use zeroize::Zeroizing;

fn print_usage() {
    eprintln!("Usage: otpauth-decrypt [--config <path>] <command>\n\nCommands:\n  uris [backup-path]\n  export-json [backup-path]\n  inspect <archive-path>\n\nThe password is read from OTPAUTH_PASSWORD (or the config's passwordEnv), else from stdin.");
}

fn init_logging(config: &RuntimeConfig) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = &config.log_level {
        builder.parse_filters(level);
    }
    builder.init();
}

/// Pulls `--config <path>` out of the argument list.
fn take_config_flag(args: &mut Vec<String>) -> Result<Option<PathBuf>, String> {
    let Some(position) = args.iter().position(|arg| arg == "--config") else {
        return Ok(None);
    };
    if position + 1 >= args.len() {
        return Err("--config needs a path".to_string());
    }
    let path = args.remove(position + 1);
    args.remove(position);
    Ok(Some(PathBuf::from(path)))
}

/// Prompts on the terminal with echo off; piped input is read as one line.
fn read_password(config: &RuntimeConfig) -> Result<Zeroizing<String>, String> {
    if let Some(password) = &config.password {
        return Ok(password.clone());
    }
    if atty::is(atty::Stream::Stdin) {
        return rpassword::prompt_password("Password: ")
            .map(Zeroizing::new)
            .map_err(|e| format!("password read failed: {e}"));
    }
    read_password_line(io::stdin().lock())
}

fn read_password_line(mut reader: impl BufRead) -> Result<Zeroizing<String>, String> {
    let mut line = Zeroizing::new(String::new());
    reader
        .read_line(&mut line)
        .map_err(|e| format!("password read failed: {e}"))?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn load_backup(path: Option<&String>, config: &RuntimeConfig) -> Result<BTreeMap<String, Folder>, String> {
    let path = path
        .map(PathBuf::from)
        .or_else(|| config.backup_path.clone())
        .ok_or_else(|| "no backup path given".to_string())?;
    let bytes = fs::read(&path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let password = read_password(config)?;
    decode_backup(&bytes, &password).map_err(|e| format!("decoding {} failed: {e}", path.display()))
}

fn run(args: &[String], config: &RuntimeConfig) -> Result<(), String> {
    match args.first().map(String::as_str) {
        Some("uris") if args.len() <= 2 => {
            let folders = load_backup(args.get(1), config)?;
            let builder = UriBuilder::new(config.uri_scheme.as_str());
            for (name, folder) in &folders {
                println!("# {name}");
                for account in &folder.accounts {
                    println!("{}", builder.uri(account));
                }
            }
        }
        Some("export-json") if args.len() <= 2 => {
            let folders = load_backup(args.get(1), config)?;
            let json = serde_json::to_string_pretty(&folders).map_err(|e| format!("{e}"))?;
            println!("{json}");
        }
        Some("inspect") if args.len() == 2 => {
            let bytes = fs::read(&args[1]).map_err(|e| format!("cannot read {}: {e}", args[1]))?;
            let unarchiver = Unarchiver::parse(&bytes).map_err(|e| format!("{e}"))?;
            let json = serde_json::to_string_pretty(&unarchiver.info()).map_err(|e| format!("{e}"))?;
            println!("{json}");
        }
        _ => print_usage(),
    }
    Ok(())
}

fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = match take_config_flag(&mut args) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            process::exit(2);
        }
    };
    let config = match config_path {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("config load failed: {err}");
                process::exit(1);
            }
        },
        None => RuntimeConfig::from_env(),
    };
    init_logging(&config);

    if let Err(err) = run(&args, &config) {
        eprintln!("{err}");
        process::exit(1);
    }
}
