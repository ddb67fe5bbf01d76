use std::process::ExitCode;

use jd_archive::{ParserConfig, PatchArchive};

fn main() -> ExitCode {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("Usage: jd_archive <input.syx|mid|bin|svz|svd> [more inputs...]");
        return ExitCode::from(1);
    }

    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    let archive = match PatchArchive::from_paths_with_config(&paths, &ParserConfig::default()) {
        Ok(archive) => archive,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", e.suggested_action());
            return ExitCode::from(e.exit_code() as u8);
        },
    };

    match archive.summary().to_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Failed to render summary: {}", e);
            ExitCode::from(5)
        },
    }
}
