//! # nestfig demo application
//!
//! A sample CLI tool that showcases how to integrate nestfig into an
//! application. It exists to demonstrate and manually verify nestfig's
//! features.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example nestfig_demo -- "some text"
//! cargo run --example nestfig_demo -- -a backwards "some text"
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature                | How to exercise it                                                   |
//! |------------------------|----------------------------------------------------------------------|
//! | Defaults               | `cargo run --example nestfig_demo`                                   |
//! | Config file (cwd)      | Create `nestfig-demo.toml` in cwd with `times = 3`, then run         |
//! | Env var override       | `NESTFIG_DEMO__DISPLAY__COLOR=red cargo run --example nestfig_demo`  |
//! | Short form             | `cargo run --example nestfig_demo -- -t 2 hi`                        |
//! | Symbols                | `cargo run --example nestfig_demo -- --action upper hi`              |
//! | Extra arguments        | `cargo run --example nestfig_demo -- hi there everyone`              |
//! | Help text              | `cargo run --example nestfig_demo -- --display.format summary`       |
//! | Dump as TOML/JSON/conf | `cargo run --example nestfig_demo -- --display.format toml`          |
//! | Logging                | `RUST_LOG=nestfig=debug cargo run --example nestfig_demo`            |

mod config;

use std::process::ExitCode;

use nestfig::{ConfigManager, Nestfig, NestfigError, SearchPath, Value};
use tracing_subscriber::EnvFilter;

fn ansi_color_code(name: &str) -> &str {
    match name {
        "red" => "\x1b[31m",
        "green" => "\x1b[32m",
        "yellow" => "\x1b[33m",
        "blue" => "\x1b[34m",
        "magenta" => "\x1b[35m",
        "cyan" => "\x1b[36m",
        _ => "\x1b[0m",
    }
}

const RESET: &str = "\x1b[0m";

fn load() -> Result<ConfigManager, NestfigError> {
    config::install_actions()?;
    Nestfig::builder()
        .app_name("nestfig-demo")
        .search_paths(vec![
            SearchPath::Platform,
            SearchPath::Home(".nestfig-demo"),
            SearchPath::Cwd,
        ])
        .definition(config::definitions()?)
        .args(std::env::args())
        .load()
}

fn print(manager: &ConfigManager) -> Result<(), NestfigError> {
    let text = |path: &str| manager.get(path).map(Value::to_string).unwrap_or_default();
    match text("display.format").as_str() {
        "summary" => print!("{}", manager.summary()),
        "toml" => print!("{}", manager.write_toml()),
        "json" => println!("{}", manager.write_json()?),
        "conf" => print!("{}", manager.write_conf()),
        _ => {
            let color = text("display.color");
            println!("{}{}{RESET}", ansi_color_code(&color), text("result"));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match load().and_then(|manager| print(&manager)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
