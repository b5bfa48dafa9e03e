use std::env;
use std::process::ExitCode;

use yamlet::{Loader, LoaderOptions, StringifyStyle};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = match args.get(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: yamlet <file> [key] [--explain]");
            return ExitCode::FAILURE;
        }
    };
    let explain = args.iter().any(|a| a == "--explain");
    let key = args.get(2).filter(|a| a.as_str() != "--explain");

    let loader = Loader::new(LoaderOptions::new().stringify_style(StringifyStyle::Diagnostic));
    let doc = match loader.load_file(file_path) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match key {
        Some(key) if explain => match doc.explain_value(key) {
            Ok(trace) => print!("{trace}"),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        Some(key) => match doc.get(key) {
            Ok(value) => println!("{value}"),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            for key in doc.root().keys().collect::<Vec<_>>() {
                match doc.get(key) {
                    Ok(value) => println!("{key}: {value}"),
                    Err(err) => {
                        eprintln!("error: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            }
        }
    }

    ExitCode::SUCCESS
}
