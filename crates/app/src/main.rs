use chrono::{DateTime, Datelike, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{Engine, MoneyCents, NewVehicle, VehicleId, VehicleState};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;

mod settings;

type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "coopfleet")]
#[command(about = "Fleet and member ledger tooling for the cooperative")]
struct Cli {
    /// Database connection string, overriding `settings.toml` (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Vehicle(Vehicle),
    /// Vehicles free for the whole window.
    Available(Window),
    /// Total cost of ownership of one vehicle.
    Tco(TcoArgs),
    FleetTco(AsOf),
    Profitability(Year),
    Bilan(Window),
    Monthly(Year),
    Budget(Year),
    Account(Account),
}

#[derive(Args, Debug)]
struct Vehicle {
    #[command(subcommand)]
    command: VehicleCommand,
}

#[derive(Subcommand, Debug)]
enum VehicleCommand {
    List,
    Add(VehicleAddArgs),
    /// Administrative state change (available, out_of_service, assigned, broken).
    State(VehicleStateArgs),
}

#[derive(Args, Debug)]
struct VehicleAddArgs {
    #[arg(long)]
    registration: String,
    #[arg(long)]
    acquired_at: DateTime<Utc>,
    /// Acquisition price, e.g. `18500.00`.
    #[arg(long)]
    price: MoneyCents,
    #[arg(long, default_value_t = 0)]
    distance_km: i64,
}

#[derive(Args, Debug)]
struct VehicleStateArgs {
    id: VehicleId,
    #[arg(value_parser = parse_state)]
    state: VehicleState,
}

#[derive(Args, Debug)]
struct Window {
    #[arg(long)]
    from: DateTime<Utc>,
    #[arg(long)]
    to: DateTime<Utc>,
}

#[derive(Args, Debug)]
struct TcoArgs {
    id: VehicleId,
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct AsOf {
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct Year {
    /// Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,
}

impl Year {
    fn or_current(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Show { number: String },
    Movements { number: String },
    /// Replays the movements and compares with the stored balance.
    Verify { number: String },
    /// Replays the movements and rewrites the stored balance.
    Recompute { number: String },
}

fn parse_state(raw: &str) -> Result<VehicleState, String> {
    VehicleState::try_from(raw).map_err(|err| err.to_string())
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "coopfleet={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database_url());
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;

    let engine = Engine::builder().database(database).build().await?;
    run(&engine, cli.command).await
}

async fn run(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::Vehicle(vehicle) => match vehicle.command {
            VehicleCommand::List => print_json(&engine.vehicles().await?),
            VehicleCommand::Add(args) => {
                let id = engine
                    .new_vehicle(NewVehicle {
                        registration: args.registration,
                        acquired_at: args.acquired_at,
                        acquisition_price: args.price,
                        distance_km: args.distance_km,
                    })
                    .await?;
                tracing::info!(vehicle_id = %id, "vehicle registered");
                print_json(&engine.vehicle(id).await?)
            }
            VehicleCommand::State(args) => {
                print_json(&engine.set_vehicle_state(args.id, args.state).await?)
            }
        },
        Command::Available(window) => {
            print_json(&engine.available_vehicles(window.from, window.to).await?)
        }
        Command::Tco(args) => {
            let report = match args.as_of {
                Some(as_of) => engine.compute_tco_at(args.id, as_of).await?,
                None => engine.compute_tco(args.id).await?,
            };
            print_json(&report)
        }
        Command::FleetTco(args) => {
            let as_of = args.as_of.unwrap_or_else(Utc::now);
            print_json(&engine.fleet_tco(as_of).await?)
        }
        Command::Profitability(year) => {
            print_json(&engine.compute_profitability(year.or_current()).await?)
        }
        Command::Bilan(window) => print_json(&engine.period_bilan(window.from, window.to).await?),
        Command::Monthly(year) => print_json(&engine.monthly_evolution(year.or_current()).await?),
        Command::Budget(year) => print_json(&engine.budget_breakdown(year.or_current()).await?),
        Command::Account(account) => match account.command {
            AccountCommand::Show { number } => print_json(&engine.account_by_number(&number).await?),
            AccountCommand::Movements { number } => {
                let account = engine.account_by_number(&number).await?;
                print_json(&engine.movements(account.id).await?)
            }
            AccountCommand::Verify { number } => {
                let account = engine.account_by_number(&number).await?;
                print_json(&engine.verify_balance(account.id).await?)
            }
            AccountCommand::Recompute { number } => {
                let account = engine.account_by_number(&number).await?;
                print_json(&engine.recompute_balance(account.id).await?)
            }
        },
    }
}
