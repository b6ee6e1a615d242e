use anyhow::Context;
use clap::{Parser, Subcommand};
use weather_core::{
    Config, Created, IndexRow, RecordId, Shown, SourceKind, ViewModel, WeatherService,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "locweather", version, about = "Weather by location, cached per lookup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the Visual Crossing API key and data source.
    Configure,

    /// Look up a new location and store it.
    Add {
        /// Address or location name, e.g. "Plentywood, MT".
        input: String,
    },

    /// Show weather for a stored location, refreshing it if the cache expired.
    Show {
        id: u64,

        /// Print the view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored locations with their last known conditions.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Forget a stored location.
    Delete { id: u64 },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config)?,
            Command::Add { input } => {
                let created = service(&config)?.create(&input).await?;
                if !created.is_valid() {
                    tracing::warn!(
                        record_id = %created.record.id,
                        errors = ?created.errors,
                        "lookup failed for new location"
                    );
                }
                print_created(&created);
            }
            Command::Show { id, json } => {
                let shown = service(&config)?.show(RecordId(id)).await?;
                tracing::debug!(record_id = id, from_cache = shown.from_cache, "showing location");
                if json {
                    println!("{}", serde_json::to_string_pretty(&shown.view)?);
                } else {
                    print_shown(&shown);
                }
            }
            Command::List { json } => {
                let rows = service(&config)?.index()?;
                if json {
                    let items: Vec<_> = rows
                        .iter()
                        .map(|row| {
                            serde_json::json!({
                                "id": row.record.id,
                                "input": row.record.input,
                                "resolvedAs": row.record.resolved_as,
                                "generatedAt": row.record.generated_at,
                                "summary": row.summary,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&items)?);
                } else {
                    print_index(&rows);
                }
            }
            Command::Delete { id } => {
                service(&config)?.delete(RecordId(id))?;
                println!("Deleted location {id}");
            }
        }

        Ok(())
    }
}

fn service(config: &Config) -> anyhow::Result<WeatherService> {
    WeatherService::from_config(config).context("Failed to set up weather service")
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let kinds: Vec<SourceKind> = SourceKind::all().to_vec();
    let kind = inquire::Select::new("Where should weather come from?", kinds).prompt()?;
    config.set_source(kind);

    if kind == SourceKind::Live {
        let key = inquire::Password::new("Visual Crossing API key:")
            .without_confirmation()
            .prompt()?;
        config.api_key = Some(key.trim().to_string());
    }

    config.save()?;
    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

fn print_created(created: &Created) {
    if created.is_valid() {
        println!("Added location {}: {}", created.record.id, created.record.input);
    } else {
        println!(
            "Added location {} ({}), but the lookup failed:",
            created.record.id, created.record.input
        );
        for err in &created.errors {
            println!("  - {err}");
        }
    }
    println!();
    print_view(&created.record.title(), &created.view);
}

fn print_shown(shown: &Shown) {
    let mut title = shown.record.title();
    if shown.from_cache {
        title.push_str(" (from cache)");
    }
    print_view(&title, &shown.view);
}

fn print_view(title: &str, view: &ViewModel) {
    println!("{title}");

    if let Some(error) = &view.error {
        println!("  lookup failed: {error}");
    }

    println!();
    println!("Current conditions");
    for (name, value) in view.current_conditions.iter() {
        println!("  {name:<18} {value}");
    }

    if !view.high_low.is_empty() {
        println!();
        println!("  {:<10} {:>8} {:>8} {:>8}", "", "mean", "high", "low");
        for (row, fields) in view.high_low.iter() {
            println!(
                "  {row:<10} {:>8} {:>8} {:>8}",
                fields.get("mean").unwrap_or_default(),
                fields.get("high").unwrap_or_default(),
                fields.get("low").unwrap_or_default(),
            );
        }
    }

    if !view.hourly.is_empty() {
        println!();
        println!("Hourly");
        for hour in &view.hourly {
            let line: Vec<&str> = hour.iter().map(|(_, value)| value).collect();
            println!("  {}", line.join("  "));
        }
    }
}

fn print_index(rows: &[IndexRow]) {
    if rows.is_empty() {
        println!("No locations yet. Add one with `locweather add \"City, ST\"`.");
        return;
    }

    println!(
        "{:>4}  {:<32} {:>8} {:>10} {:>8}",
        "id", "location", "temp", "feels like", "precip %"
    );
    for row in rows {
        let cell = |i: usize| row.summary.get(i).map(String::as_str).unwrap_or_default();
        println!(
            "{:>4}  {:<32} {:>8} {:>10} {:>8}",
            row.record.id,
            row.record.resolved_as,
            cell(0),
            cell(1),
            cell(2)
        );
    }
}
