//! EcoTrace Scan CLI
//!
//! Runs the deposit workflow against an EcoTrace API from the command line.
//! The bin QR payload and device position are passed as arguments.

use clap::{Parser, Subcommand};
use ecotrace_client::config::parse_threshold;
use ecotrace_client::{
    ClientConfig, ClientError, Coordinates, DepositWorkflow, FingerprintStrategy, FixedGeolocator,
    HttpLedgerApi, LedgerApi, PhotoEvidence, ScanProfile,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ecotrace-scan")]
#[command(about = "Scan client for the EcoTrace recycling program")]
struct Cli {
    /// API base URL
    #[arg(long, env = "ECOTRACE_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one deposit: bin check, evidence, submission
    Deposit {
        /// Login email
        #[arg(short, long)]
        email: String,

        /// Decoded bin QR payload, e.g. '{"lat":19.43,"lng":-99.13}'
        #[arg(long)]
        bin_payload: String,

        /// Device latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Device longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Material id or name
        #[arg(short, long)]
        material: String,

        /// Weight in kilograms
        #[arg(short, long)]
        weight: String,

        #[arg(long)]
        brand: Option<String>,

        /// Decoded product barcode
        #[arg(long)]
        barcode: Option<String>,

        /// Evidence photo file
        #[arg(long)]
        photo: Option<PathBuf>,

        /// basic or extended (overrides ECOTRACE_PROFILE)
        #[arg(long)]
        profile: Option<ScanProfile>,

        /// Max distance to the bin in meters (overrides ECOTRACE_PROXIMITY_M)
        #[arg(long, value_parser = parse_threshold)]
        proximity_m: Option<f64>,

        /// name-size or content-hash (overrides ECOTRACE_PHOTO_FINGERPRINT)
        #[arg(long)]
        fingerprint: Option<FingerprintStrategy>,
    },

    /// List materials and their rates
    Materials,

    /// Print the environmental impact report
    Report,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,ecotrace_client=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    let api = Arc::new(HttpLedgerApi::new(&config.api_url)?);

    match cli.command {
        Commands::Materials => {
            for material in api.materials().await? {
                println!(
                    "{:>4}  {:<20} {:>8.1} pts/kg",
                    material.id, material.name, material.points_per_kg
                );
            }
        }
        Commands::Report => {
            println!(
                "{:<20} {:>9} {:>12} {:>10}",
                "material", "deposits", "weight (kg)", "points"
            );
            for row in api.report().await? {
                println!(
                    "{:<20} {:>9} {:>12.2} {:>10}",
                    row.material, row.deposits, row.total_weight_kg, row.total_points
                );
            }
        }
        Commands::Deposit {
            email,
            bin_payload,
            lat,
            lng,
            material,
            weight,
            brand,
            barcode,
            photo,
            profile,
            proximity_m,
            fingerprint,
        } => {
            if let Some(profile) = profile {
                config.workflow.profile = profile;
            }
            if let Some(meters) = proximity_m {
                config.workflow.proximity_threshold_m = meters;
            }
            if let Some(fingerprint) = fingerprint {
                config.workflow.fingerprint = fingerprint;
            }

            let evidence = match &photo {
                Some(path) => Some(PhotoEvidence::from_path(path).await?),
                None => None,
            };

            let geolocator = Arc::new(FixedGeolocator::new(Coordinates::new(lat, lng)));
            let mut workflow = DepositWorkflow::new(api, geolocator, config.workflow);

            let steps = async {
                let user = workflow.login(&email).await?;
                println!("Hello {} ({} points)", user.name, user.points);

                workflow.open_bin_scanner()?;
                let distance = workflow.handle_bin_scan(&bin_payload).await?;
                println!("Bin verified at {:.0} m", distance);

                if let Some(code) = &barcode {
                    workflow.open_product_scanner()?;
                    workflow.handle_product_scan(code)?;
                }

                if let Some(evidence) = &evidence {
                    workflow.attach_photo(evidence)?;
                }

                let material_id = match material.parse::<i64>() {
                    Ok(id) => id,
                    Err(_) => workflow
                        .material_by_name(&material)
                        .map(|m| m.id)
                        .ok_or_else(|| ClientError::MaterialNotFound(material.clone()))?,
                };
                workflow.select_material(material_id)?;
                workflow.set_weight_input(&weight);
                if let Some(brand) = &brand {
                    workflow.set_brand(brand);
                }

                workflow.submit().await
            };

            let result = steps.await;
            match result {
                Ok(outcome) => {
                    println!(
                        "Deposit #{} recorded: +{} points, balance {}",
                        outcome.receipt.deposit_id,
                        outcome.receipt.points_awarded,
                        outcome.user.points
                    );
                }
                Err(e) => {
                    let message = workflow
                        .notice()
                        .map(|n| n.text.clone())
                        .unwrap_or_else(|| e.user_message());
                    eprintln!("{}", message);
                    eprintln!("  ({})", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
