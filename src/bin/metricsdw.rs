use clap::{Args, Parser, Subcommand};

use metricsdw::metrics::catalog;
use metricsdw::{
    DimensionRanking, GoalDefinition, GoalId, GoalMetrics, MetricsDW, Period, RenderContext,
    ReportRequest, SortOrder, Table, Value,
};

#[derive(Parser)]
#[command(name = "metricsdw", about = "Derived metrics and goal reports over archived analytics tables")]
struct Cli {
    /// Database path (default: ~/.metricsdw/metricsdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PeriodArgs {
    /// Period: day, week, month, year, range
    #[arg(long, default_value = "day")]
    period: String,
    /// Date: today, yesterday, YYYY-MM-DD, or start,end / lastN / previousN for ranges
    #[arg(long, default_value = "yesterday")]
    date: String,
}

impl PeriodArgs {
    fn parse(&self) -> metricsdw::Result<Period> {
        Period::parse(&self.period, &self.date)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import archived report tables and goals from a JSON file
    Import {
        /// Path to the JSON import file
        file: String,
    },
    /// Query an archived report, computing derived metrics
    Report {
        /// Report method (e.g. Referrers.getKeywords)
        method: String,
        #[command(flatten)]
        period: PeriodArgs,
        /// Segment expression
        #[arg(long)]
        segment: Option<String>,
        /// Goal id (number, ecommerceOrder, ecommerceAbandonedCart)
        #[arg(long)]
        goal: Option<String>,
        /// Keep rows whose label matches this regular expression
        #[arg(long)]
        filter: Option<String>,
        /// Derived metrics to compute (comma-separated)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
        /// Columns to show (comma-separated)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Sort column
        #[arg(long)]
        sort: Option<String>,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
        /// Render values for machines (no "-" placeholders)
        #[arg(long)]
        raw: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Top converting countries, keywords and websites for a goal
    TopDimensions {
        /// Goal id
        goal: String,
        #[command(flatten)]
        period: PeriodArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Full report for one goal
    GoalReport {
        /// Goal id (number or ecommerceOrder)
        goal: String,
        #[command(flatten)]
        period: PeriodArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overview of all goals
    Overview {
        #[command(flatten)]
        period: PeriodArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage goal definitions
    Goals {
        #[command(subcommand)]
        action: GoalsAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalsAction {
    /// Add or replace a goal
    Add {
        id: u32,
        name: String,
        /// URL pattern that triggers the goal
        #[arg(long)]
        pattern: Option<String>,
        /// Allow several conversions per visit
        #[arg(long)]
        allow_multiple: bool,
    },
    /// Remove a goal
    Remove { id: u32 },
    /// List goals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => metricsdw::Database::open_at(path)?,
        None => metricsdw::Database::open()?,
    };
    let mut dw = MetricsDW::new(db)?;

    match cli.command {
        Commands::Import { file } => {
            let report = dw.import_file(&file)?;
            println!(
                "Imported {} tables ({} rows) and {} goals.",
                report.archives, report.rows, report.goals
            );
        }
        Commands::Report {
            method,
            period,
            segment,
            goal,
            filter,
            metrics,
            columns,
            sort,
            asc,
            limit,
            raw,
            json,
        } => {
            let mut request = ReportRequest::new(&method, period.parse()?);
            if let Some(segment) = &segment {
                request = request.segment(segment);
            }
            if let Some(goal) = &goal {
                request = request.goal(goal.parse()?);
            }
            if let Some(filter) = &filter {
                request = request.label_pattern(filter);
            }
            for metric in &metrics {
                request = request.metric(metric);
            }
            if !columns.is_empty() {
                let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
                request = request.columns(&cols);
            }
            if let Some(sort) = &sort {
                let order = if asc { SortOrder::Asc } else { SortOrder::Desc };
                request = request.sort(sort, order);
            }
            if let Some(limit) = limit {
                request = request.limit(limit);
            }

            let table = dw.report(&request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                let context = if raw {
                    RenderContext::Machine
                } else {
                    RenderContext::Display
                };
                print_table(&table, context);
            }
        }
        Commands::TopDimensions { goal, period, json } => {
            let goal: GoalId = goal.parse()?;
            let rankings = dw.top_dimensions(period.parse()?, &goal)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rankings)?);
            } else {
                print_rankings(&rankings);
            }
        }
        Commands::GoalReport { goal, period, json } => {
            let goal: GoalId = goal.parse()?;
            let report = dw.goal_report(period.parse()?, &goal)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Goal {} ({})", report.name, report.goal);
                if let Some(pattern) = &report.pattern {
                    println!("  Pattern:           {pattern}");
                }
                println!("  Multiple per visit: {}", report.allow_multiple);
                print_goal_metrics(&report.metrics);
                if let Some(cart) = &report.abandoned_cart {
                    println!("Abandoned carts");
                    print_goal_metrics(cart);
                }
                println!("  Returning visitors: {}", report.conversion_rate_returning);
                println!("  New visitors:       {}", report.conversion_rate_new);
                print_rankings(&report.top_dimensions);
            }
        }
        Commands::Overview { period, json } => {
            let overview = dw.goals_overview(period.parse()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                println!("All goals");
                print_goal_metrics(&overview.totals);
                for goal in &overview.goals {
                    println!(
                        "Goal {} ({})",
                        goal.name.as_deref().unwrap_or("?"),
                        goal.id.as_ref().map(|g| g.to_string()).unwrap_or_default()
                    );
                    print_goal_metrics(goal);
                }
            }
        }
        Commands::Goals { action } => handle_goals(&dw, action)?,
        Commands::Config { action } => handle_config(&mut dw, action)?,
        Commands::Status { json } => {
            let status = dw.status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Warehouse Status");
                println!("  Archived tables: {}", status.archives.len());
                println!(
                    "  Archived rows:   {}",
                    status.archives.iter().map(|a| a.row_count).sum::<i64>()
                );
                println!("  Goals:           {}", status.goals);
                println!("  Capabilities:    {}", status.settings.capabilities);
                for archive in &status.archives {
                    println!(
                        "  {} {} segment='{}' goal='{}': {} rows (imported {})",
                        archive.key.method,
                        archive.key.period_key,
                        archive.key.segment,
                        archive.key.id_goal,
                        archive.row_count,
                        archive.imported_at
                    );
                }
            }
        }
    }

    Ok(())
}

/// Print a table as tab-separated columns, rendering derived metrics with
/// their own formatting rule.
fn print_table(table: &Table, context: RenderContext) {
    if table.is_empty() {
        println!("No rows.");
        return;
    }

    let mut header: Vec<&str> = Vec::new();
    for row in table.rows() {
        for (name, _) in row.columns() {
            if !header.contains(&name) {
                header.push(name);
            }
        }
    }
    println!("{}", header.join("\t"));

    for row in table.rows() {
        let cells: Vec<String> = header
            .iter()
            .map(|name| render_cell(name, row.get(name), context))
            .collect();
        println!("{}", cells.join("\t"));
    }

    let empty = table.metadata().empty_columns();
    if !empty.is_empty() {
        println!("(no data for: {})", empty.join(", "));
    }
}

fn render_cell(name: &str, value: &Value, context: RenderContext) -> String {
    if let Some(descriptor) = catalog::lookup(name) {
        return descriptor.format(value, context);
    }
    match value {
        Value::Number(n) => n.to_string(),
        Value::Text(s) => s.clone(),
        Value::Absent => "-".to_string(),
    }
}

fn print_goal_metrics(metrics: &GoalMetrics) {
    println!("  Conversions:       {}", metrics.nb_conversions);
    println!("  Visits converted:  {}", metrics.nb_visits_converted);
    println!("  Conversion rate:   {}", metrics.conversion_rate);
    println!("  Revenue:           {:.2}", metrics.revenue);
    if let Some(ecommerce) = &metrics.ecommerce {
        println!("  Subtotal:          {:.2}", ecommerce.revenue_subtotal);
        println!("  Tax:               {:.2}", ecommerce.revenue_tax);
        println!("  Shipping:          {:.2}", ecommerce.revenue_shipping);
        println!("  Discount:          {:.2}", ecommerce.revenue_discount);
        println!("  Items:             {}", ecommerce.items);
        println!("  Avg order revenue: {:.2}", ecommerce.avg_order_revenue);
    }
}

fn print_rankings(rankings: &[DimensionRanking]) {
    for ranking in rankings {
        println!("Top {}", ranking.dimension.title());
        if ranking.entries.is_empty() {
            println!("  (none)");
        }
        for entry in &ranking.entries {
            println!(
                "  {} - {} conversions ({})",
                entry.name, entry.nb_conversions, entry.conversion_rate
            );
        }
    }
}

fn handle_goals(dw: &MetricsDW, action: GoalsAction) -> anyhow::Result<()> {
    match action {
        GoalsAction::Add {
            id,
            name,
            pattern,
            allow_multiple,
        } => {
            dw.goals_add(&GoalDefinition {
                id,
                name,
                pattern,
                allow_multiple,
            })?;
            println!("Goal {id} saved.");
        }
        GoalsAction::Remove { id } => {
            if dw.goals_remove(id)? {
                println!("Goal {id} removed.");
            } else {
                println!("Not found: goal {id}");
            }
        }
        GoalsAction::List { json } => {
            let goals = dw.goals_list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&goals)?);
            } else if goals.is_empty() {
                println!("No goals defined.");
            } else {
                for goal in goals {
                    println!(
                        "{}\t{}\t{}{}",
                        goal.id,
                        goal.name,
                        goal.pattern.as_deref().unwrap_or("-"),
                        if goal.allow_multiple { "\t(multiple)" } else { "" }
                    );
                }
            }
        }
    }
    Ok(())
}

fn handle_config(dw: &mut MetricsDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key)? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value)?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list()?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
