use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eframe::egui;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use damage_annotate::app::EditorApp;
use damage_annotate::config::Settings;
use damage_annotate::{
    DamageEditor, FileReferenceLoader, InspectionRecordStore, JsonFileBackend, PriorLayer,
    RasterCompositor, ReferenceLoader, VehicleView,
};

#[derive(Parser)]
#[command(name = "damage-annotate")]
#[command(version, about = "Vehicle damage annotation for repair-shop intake", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the editor for a vehicle, resuming its current annotation
    Edit {
        #[arg(long)]
        vehicle: String,

        #[arg(long)]
        work_order: Option<String>,

        /// front, back, side or top
        #[arg(long, default_value = "front")]
        view: VehicleView,
    },

    /// Render the vehicle's current annotation over its reference image to a PNG
    Show {
        #[arg(long)]
        vehicle: String,

        #[arg(long, default_value = "front")]
        view: VehicleView,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },

    /// List every inspection record stored for a vehicle, newest first
    History {
        #[arg(long)]
        vehicle: String,
    },

    /// Print the vehicle's current annotation as a data URI
    Export {
        #[arg(long)]
        vehicle: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "damage_annotate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    // eframe needs the main thread, so the runtime is driven by hand
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let backend = Arc::new(JsonFileBackend::new(&cli.settings.data_dir));
    let store = Arc::new(InspectionRecordStore::new(backend));

    match cli.command {
        Commands::Edit {
            vehicle,
            work_order,
            view,
        } => run_editor(&runtime, &cli.settings, store, vehicle, work_order, view),
        Commands::Show { vehicle, view, out } => {
            runtime.block_on(show(&cli.settings, &store, &vehicle, view, &out))
        }
        Commands::History { vehicle } => runtime.block_on(history(&store, &vehicle)),
        Commands::Export { vehicle } => runtime.block_on(export(&store, &vehicle)),
    }
}

fn run_editor(
    runtime: &tokio::runtime::Runtime,
    settings: &Settings,
    store: Arc<InspectionRecordStore>,
    vehicle: String,
    work_order: Option<String>,
    view: VehicleView,
) -> Result<()> {
    let prior = runtime
        .block_on(store.get_current(&vehicle))
        .context("Failed to look up the current inspection")?
        .map(|record| record.image);
    if prior.is_some() {
        tracing::info!(vehicle_id = %vehicle, "Resuming on top of the current inspection");
    }

    let loader: Arc<dyn ReferenceLoader> = Arc::new(FileReferenceLoader);
    let editor = DamageEditor::open(
        runtime.handle(),
        loader,
        settings.references().source_for(view),
        prior,
        (settings.width, settings.height),
        settings.quality,
    );

    let title = format!("damage-annotate: {vehicle} ({view})");
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.width as f32 + 40.0, settings.height as f32 + 120.0])
            .with_title(&title),
        ..Default::default()
    };

    let app = EditorApp::new(
        runtime.handle().clone(),
        store,
        vehicle,
        work_order,
        view,
        editor,
    );
    eframe::run_native(&title, options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("Editor window failed: {e}"))
}

async fn show(
    settings: &Settings,
    store: &InspectionRecordStore,
    vehicle: &str,
    view: VehicleView,
    out: &Path,
) -> Result<()> {
    let Some(record) = store.get_current(vehicle).await? else {
        bail!("No inspection stored for vehicle {vehicle}");
    };

    let mut surface = RasterCompositor::new(settings.width, settings.height);
    let prior = surface
        .initialize(
            &FileReferenceLoader,
            &settings.references().source_for(view),
            Some(&record.image),
        )
        .await?;
    if let PriorLayer::Discarded(reason) = prior {
        bail!("Stored annotation {} could not be decoded: {reason}", record.id);
    }

    surface
        .pixels()
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {}", out.display());
    Ok(())
}

async fn export(store: &InspectionRecordStore, vehicle: &str) -> Result<()> {
    let record = store
        .get_current(vehicle)
        .await?
        .with_context(|| format!("No inspection stored for vehicle {vehicle}"))?;
    println!("{}", record.image);
    Ok(())
}

async fn history(store: &InspectionRecordStore, vehicle: &str) -> Result<()> {
    let records = store.get_history(vehicle).await?;
    if records.is_empty() {
        println!("No inspections for vehicle {vehicle}");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  created {}  updated {}  work order {}  {} bytes",
            record.id,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
            record.work_order_id.as_deref().unwrap_or("-"),
            record.image.as_str().len(),
        );
    }
    Ok(())
}
