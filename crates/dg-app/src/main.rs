//! Command line entry point: serve one grid window from a CSV file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dg_core::data::Dataclass;
use dg_core::filter::FilterModel;
use dg_core::sort::SortModel;
use dg_core::window::{NoopCallback, WindowRequest, WindowResult};
use dg_data::catalog::normalize_columns;
use dg_data::persist::{BlobStore, FileBlobStore, StateUpdateSource};
use dg_data::sources::{load_csv, MemoryDatasource};
use dg_data::compile_filter;
use dg_views::{GridBindings, GridComponent, GridProps};

#[derive(Parser, Debug)]
#[command(name = "gridctl", about = "Query a CSV file the way the data grid does")]
struct Args {
    /// CSV file with a header row
    #[arg(long)]
    csv: PathBuf,

    /// Filter model as grid JSON, e.g. '{"Age":{"filterType":"number","type":"greaterThan","filter":30}}'
    #[arg(long)]
    filter: Option<String>,

    /// Sort keys, e.g. 'Name:desc,Age'
    #[arg(long)]
    sort: Option<String>,

    /// First row of the window
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Number of rows to load
    #[arg(long, default_value_t = 100)]
    count: usize,

    /// Dataclass name given to the loaded rows
    #[arg(long, default_value = "Rows")]
    dataclass: String,

    /// Directory for persisted grid state; the last filter is restored from it
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let dataclass = load_csv(&args.csv, &args.dataclass)
        .await
        .with_context(|| format!("loading {}", args.csv.display()))?;
    let columns = normalize_columns(&dataclass.attributes());
    info!(columns = columns.len(), rows = dataclass.len(), "Loaded dataclass {}", dataclass.name());

    let datasource = Arc::new(MemoryDatasource::new(args.dataclass.to_lowercase(), Arc::new(dataclass)));
    let blobs: Option<Arc<dyn BlobStore>> = match &args.state_dir {
        Some(dir) => Some(Arc::new(FileBlobStore::new(dir.clone())?)),
        None => None,
    };

    let props = GridProps {
        datasource: Some(args.dataclass.clone()),
        columns: columns.clone(),
        node_id: "gridctl".to_string(),
        ..Default::default()
    };
    let grid = GridComponent::render(
        props,
        GridBindings {
            datasource: Some(datasource),
            blobs,
            ..Default::default()
        },
    );
    grid.initialize().await?;

    let filter_model = match &args.filter {
        Some(raw) => {
            let model: FilterModel = serde_json::from_str(raw).context("parsing --filter")?;
            let column_state = grid.current_state()?.column_state;
            grid.on_state_updated(&[StateUpdateSource::Filter], column_state, model.clone())
                .await?;
            model
        }
        None => grid.filter_model()?,
    };
    let sort_model: SortModel = match &args.sort {
        Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
        None => SortModel::new(),
    };

    let request = WindowRequest::new(args.start, args.start.saturating_add(args.count))
        .with_sort(sort_model)
        .with_filter(filter_model.clone());

    match grid.get_rows(&request, &mut NoopCallback).await? {
        WindowResult::Loaded { rows, total_length } => {
            let output = json!({
                "query": compile_filter(&filter_model, &columns),
                "totalLength": total_length,
                "rows": rows.iter().map(|row| row.to_json()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        WindowResult::Failed => {
            warn!("Window request failed");
            anyhow::bail!("window {}..{} could not be loaded", request.start_row, request.end_row)
        }
    }
}
