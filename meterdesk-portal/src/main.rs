use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use jiff::civil::Date;
use meterdesk_core::{BuildingId, TicketStatus};
use meterdesk_list::views::{BuildingColumn, BuildingPredicate, InvoiceColumn, TicketPredicate};
use meterdesk_list::{SortState, view};
use meterdesk_portal::{
    Config, ExportKind, ExportParams, ExportState, Portal,
    resources::{self, InvoiceFilter},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "meterdesk")]
#[command(about = "Metering portal client")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "meterdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List buildings
    Buildings {
        #[arg(short, long, default_value = "")]
        query: String,
        /// Only buildings with open leaks
        #[arg(long)]
        leaks: bool,
        #[arg(long, value_enum)]
        sort: Option<BuildingSort>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    /// List tickets
    Tickets {
        #[arg(short, long, default_value = "")]
        query: String,
        /// Hide closed tickets
        #[arg(long)]
        pending: bool,
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    /// List invoices edited in a date range
    Invoices {
        #[arg(long)]
        building: Option<String>,
        #[arg(long)]
        from: Option<Date>,
        #[arg(long)]
        to: Option<Date>,
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    /// Download an export into the configured directory
    Export {
        kind: ExportKind,
        #[arg(long)]
        building: Option<String>,
        #[arg(long)]
        from: Option<Date>,
        #[arg(long)]
        to: Option<Date>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildingSort {
    Reference,
    City,
    Leaks,
    Malfunctions,
    LastReading,
}

impl From<BuildingSort> for BuildingColumn {
    fn from(sort: BuildingSort) -> Self {
        match sort {
            BuildingSort::Reference => BuildingColumn::Reference,
            BuildingSort::City => BuildingColumn::City,
            BuildingSort::Leaks => BuildingColumn::Leaks,
            BuildingSort::Malfunctions => BuildingColumn::Malfunctions,
            BuildingSort::LastReading => BuildingColumn::LastReading,
        }
    }
}

fn sort_state(sort: Option<BuildingSort>, desc: bool) -> SortState<BuildingColumn> {
    match sort {
        None => SortState::Unsorted,
        Some(column) if desc => SortState::descending(column.into()),
        Some(column) => SortState::ascending(column.into()),
    }
}

fn footer(page: usize, page_count: usize, total: usize) {
    println!("-- page {page}/{page_count}, {total} result(s)");
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };
    let page_size = config.list.page_size;
    let portal = Portal::from_config(&config)?;

    match cli.command {
        Command::Buildings {
            query,
            leaks,
            sort,
            desc,
            page,
        } => {
            let buildings = portal.fetch(resources::buildings()).await?;
            let predicates: &[BuildingPredicate] = if leaks {
                &[BuildingPredicate::HasLeaks]
            } else {
                &[]
            };
            let shown = view(
                &buildings,
                &query,
                predicates,
                sort_state(sort, desc),
                page,
                page_size,
            );
            for b in &shown.items {
                println!(
                    "{:<10} {:<12} {:<40} {:<20} leaks={} malfunctions={}",
                    b.id,
                    b.reference,
                    b.address.line1,
                    b.address.city,
                    b.issues.leaks,
                    b.issues.malfunctions
                );
            }
            footer(shown.page, shown.page_count, shown.total_count);
        }
        Command::Tickets {
            query,
            pending,
            page,
        } => {
            let tickets = portal.fetch(resources::tickets()).await?;
            let predicates: &[TicketPredicate] = if pending {
                &[TicketPredicate::Pending]
            } else {
                &[]
            };
            let shown = view(&tickets, &query, predicates, SortState::Unsorted, page, page_size);
            for t in &shown.items {
                let status = match t.status {
                    TicketStatus::New => "new",
                    TicketStatus::Open => "open",
                    TicketStatus::ScheduledIntervention => "scheduled",
                    TicketStatus::Closed => "closed",
                };
                println!(
                    "{:<12} {:<10} {:<30} {}",
                    t.case_number, status, t.requester_name, t.status_label
                );
            }
            footer(shown.page, shown.page_count, shown.total_count);
        }
        Command::Invoices {
            building,
            from,
            to,
            page,
        } => {
            let filter = InvoiceFilter {
                building: building.map(BuildingId::new),
                from,
                to,
            };
            let invoices = portal.fetch(resources::invoices(&filter)).await?;
            let shown = view(
                &invoices,
                "",
                &[],
                SortState::descending(InvoiceColumn::EditedOn),
                page,
                page_size,
            );
            for i in &shown.items {
                let edited = i.edited_on.map(|d| d.to_string()).unwrap_or_default();
                println!(
                    "{:<14} {:<10} {:>16} {}",
                    i.number, edited, i.amount_incl_tax_display, i.address.city
                );
            }
            footer(shown.page, shown.page_count, shown.total_count);
        }
        Command::Export {
            kind,
            building,
            from,
            to,
        } => {
            let params = ExportParams {
                building: building.map(BuildingId::new),
                from,
                to,
            };
            portal.trigger_export(kind, params);
            match portal.exports().manager(kind).settled().await {
                ExportState::Failed(error) => return Err(eyre!(error)),
                _ => println!("{kind} export saved to {}", config.export.directory.display()),
            }
        }
    }

    Ok(())
}
