use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use unit_converter_lib::commands;
use unit_converter_lib::logging::init_tracing;
use unit_converter_lib::shared::settings::AppSettings;
use unit_converter_lib::shared::types::{AiConvertRequest, AiConvertResponse};
use unit_converter_lib::{AppResult, ConverterSession};

const HELP: &str = "\
commands:
  <value> <from> <to>   convert within the current category (e.g. 5 mi km)
  <value>               convert with the current units
  cat <name>            switch category (Length, Mass, Volume, ...)
  units                 list units of the current category
  swap                  swap from and to units
  ref                   quick reference table for the current units
  ask <query>           natural-language conversion (needs an API key)
  key <api key>         store the model API key and enable 'ask'
  settings              show current settings
  history               show recent conversions
  clear                 clear history
  quit                  exit";

#[tokio::main]
async fn main() -> AppResult<()> {
    init_tracing();

    let mut settings = AppSettings::load().await.unwrap_or_else(|e| {
        warn!(error = %e, "[Main] Failed to load settings, using defaults");
        AppSettings::default()
    });
    info!(settings = ?settings.masked(), "[Main] Settings loaded");

    let mut session = ConverterSession::from_settings(&settings)?;

    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    println!("{}", HELP);
    print_state(&session);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => continue,
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            "cat" => {
                session.select_category(rest);
                print_state(&session);
            }
            "units" => {
                for unit in &session.active_category().units {
                    println!("  {:<10} {} ({})", unit.id, unit.name, unit.symbol);
                }
            }
            "swap" => {
                session.swap_units();
                print_state(&session);
            }
            "ref" => match commands::quick_reference_command(&session) {
                Ok(table) => {
                    println!("  {} → {}   {}", table.from_symbol, table.to_symbol, table.formula);
                    for row in table.rows {
                        println!("  {:>5} {} = {} {}", row.input, table.from_symbol, row.output, table.to_symbol);
                    }
                }
                Err(e) => println!("error: {}", e),
            },
            "ask" => {
                let request = AiConvertRequest { query: rest.to_string() };
                match commands::convert_with_ai_command(&mut session, request).await {
                    AiConvertResponse::Success(result) => {
                        println!(
                            "  {} {} = {} {}",
                            result.source_value, result.source_unit, result.target_value, result.target_unit
                        );
                        println!("  {}", result.explanation);
                        println!("  formula: {}", result.formula);
                    }
                    AiConvertResponse::NotUnderstood => {
                        println!("  Could not understand that as a conversion. Try rephrasing.")
                    }
                    AiConvertResponse::Failed { message } => println!("error: {}", message),
                }
            }
            "key" => {
                let saved = match AppSettings::get_settings_path() {
                    Ok(path) => commands::set_api_key_command(&mut session, &mut settings, &path, rest).await,
                    Err(e) => Err(e),
                };
                match saved {
                    Ok(_) => println!("  API key saved, 'ask' is available"),
                    Err(e) => println!("error: {}", e),
                }
            }
            "settings" => match serde_json::to_string_pretty(&commands::get_settings_command(&settings)) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("error: {}", e),
            },
            "history" => {
                let history = commands::get_history_command(&session);
                if history.entries.is_empty() {
                    println!("  (empty)");
                }
                for entry in history.entries {
                    let marker = if entry.is_ai_generated == Some(true) { " [ai]" } else { "" };
                    println!(
                        "  {} {} = {} {}  ({}){}",
                        entry.from_value, entry.from_unit, entry.to_value, entry.to_unit, entry.category, marker
                    );
                }
            }
            "clear" => {
                commands::clear_history_command(&mut session);
                println!("  history cleared");
            }
            _ => manual_conversion(&mut session, line),
        }
    }

    Ok(())
}

fn manual_conversion(session: &mut ConverterSession, line: &str) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (value, units) = match parts.as_slice() {
        [value] => (*value, None),
        [value, from, to] => (*value, Some((*from, *to))),
        _ => {
            println!("unrecognised input, type 'help'");
            return;
        }
    };

    if let Some((from, to)) = units {
        if let Err(e) = session.set_units(from, to) {
            println!("error: {}", e);
            return;
        }
    }

    session.set_input(value);
    print_state(session);
    commands::commit_conversion_command(session);
}

fn print_state(session: &ConverterSession) {
    println!(
        "[{}] {} {} = {} {}",
        session.active_category().name,
        session.input(),
        session.from_unit(),
        session.output(),
        session.to_unit()
    );
}
