use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::json;
use simpletsdb::{
    AggregatorQuery, ClientConfig, DeletePointsRequest, DownsampleQuery, Downsampler,
    InsertPointRequest, Options, Point, PointValue, QueryPointsRequest, SimpleTsdb,
};
use tracing::info;

const SECOND_NANOS: i64 = 1_000_000_000;

const USAGE: &str = "Usage: simpletsdb-cli <command> [args]

Commands:
  insert <metric> <value> [key=value ...]
  query <metric> [lookback_secs] [limit] [key=value ...]
  delete <metric> [lookback_secs] [key=value ...]
  add-downsampler <metric> <out_metric> <run_every> <window_every> <aggregator>
  list-downsamplers
  delete-downsampler <id>
  demo

Connection settings come from SIMPLETSDB_HOST, SIMPLETSDB_PORT,
SIMPLETSDB_TIMEOUT_MS and SIMPLETSDB_CHUNK_SIZE.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = ClientConfig::from_env();
    info!("Connecting to {}", config.base_url());
    let db = SimpleTsdb::with_config(config)?;
    run(&db, &args).await
}

async fn run(db: &SimpleTsdb, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let command = required(args, 0, "command")?;
    let rest = &args[1..];

    match command {
        "insert" => insert(db, rest).await?,
        "query" => query(db, rest).await?,
        "delete" => delete(db, rest).await?,
        "add-downsampler" => add_downsampler(db, rest).await?,
        "list-downsamplers" => list_downsamplers(db).await?,
        "delete-downsampler" => {
            let id: i64 = required(rest, 0, "id")?.parse()?;
            db.delete_downsampler(id).await?;
            println!("Deleted downsampler {}", id);
        }
        "demo" => demo(db).await?,
        other => return Err(format!("unknown command: {}\n\n{}", other, USAGE).into()),
    }

    Ok(())
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn format_timestamp(nanos: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(nanos).to_rfc3339()
}

/// Start of a window reaching `lookback_secs` back from `now`, both in nanoseconds.
fn lookback_start(now: i64, lookback_secs: i64) -> Result<i64, String> {
    lookback_secs
        .checked_mul(SECOND_NANOS)
        .and_then(|span| now.checked_sub(span))
        .ok_or_else(|| format!("lookback out of range: {}s", lookback_secs))
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument <{}>\n\n{}", name, USAGE))
}

/// Splits trailing `key=value` arguments into tag pairs.
fn parse_tags(args: &[String]) -> Result<Vec<(String, String)>, String> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| format!("expected key=value, got {:?}", arg))
        })
        .collect()
}

fn parse_value(raw: &str) -> PointValue {
    if let Ok(v) = raw.parse::<i64>() {
        PointValue::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        PointValue::Float(v)
    } else {
        PointValue::Text(raw.to_string())
    }
}

async fn insert(db: &SimpleTsdb, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let metric = required(args, 0, "metric")?;
    let value = parse_value(required(args, 1, "value")?);

    let mut request = InsertPointRequest::new(metric, Point::new(value, now_nanos()));
    for (key, tag_value) in parse_tags(&args[2..])? {
        request = request.with_tag(key, tag_value);
    }

    db.insert_point(request).await?;
    println!("✓ Inserted 1 point into {}", metric);
    Ok(())
}

async fn query(db: &SimpleTsdb, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let metric = required(args, 0, "metric")?;
    let lookback: i64 = args.get(1).map(|s| s.parse::<i64>()).transpose()?.unwrap_or(3600);
    let limit: Option<i64> = args.get(2).map(|s| s.parse::<i64>()).transpose()?;

    let start = lookback_start(now_nanos(), lookback)?;
    let mut request = QueryPointsRequest::new(metric, start);
    if let Some(limit) = limit {
        request = request.with_limit(limit);
    }
    for (key, value) in parse_tags(args.get(3..).unwrap_or_default())? {
        request = request.with_tag(key, value);
    }

    let points = db.query_points(&request).await?;
    println!("{}: {} points", metric, points.len());
    for point in &points {
        match point.window {
            Some(window) => println!("  {} -> {} (window {})", format_timestamp(point.timestamp), point.value, window),
            None => println!("  {} -> {}", format_timestamp(point.timestamp), point.value),
        }
    }
    Ok(())
}

async fn delete(db: &SimpleTsdb, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let metric = required(args, 0, "metric")?;
    let lookback: i64 = args.get(1).map(|s| s.parse::<i64>()).transpose()?.unwrap_or(3600);

    let end = now_nanos();
    let mut request = DeletePointsRequest::new(metric, lookback_start(end, lookback)?, end);
    for (key, value) in parse_tags(args.get(2..).unwrap_or_default())? {
        request = request.with_tag(key, value);
    }

    db.delete_points(&request).await?;
    println!("✓ Deleted points of {} from the last {}s", metric, lookback);
    Ok(())
}

async fn add_downsampler(db: &SimpleTsdb, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let metric = required(args, 0, "metric")?;
    let out_metric = required(args, 1, "out_metric")?;
    let run_every = required(args, 2, "run_every")?;
    let window_every = required(args, 3, "window_every")?;
    let aggregator = required(args, 4, "aggregator")?;

    let mut window = Options::new();
    window.insert("every".to_string(), json!(window_every));
    let query = DownsampleQuery::new(window).with_aggregator(AggregatorQuery::new(aggregator));

    db.add_downsampler(&Downsampler::new(metric, out_metric, run_every, query)).await?;
    println!("✓ Added downsampler {} -> {}", metric, out_metric);
    Ok(())
}

async fn list_downsamplers(db: &SimpleTsdb) -> Result<(), Box<dyn std::error::Error>> {
    let downsamplers = db.list_downsamplers().await?;
    println!("{} downsamplers", downsamplers.len());
    for d in &downsamplers {
        let aggregators: Vec<&str> = d.query.aggregators.iter().map(|a| a.name.as_str()).collect();
        println!(
            "  [{}] {} -> {} every {} ({})",
            d.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            d.metric,
            d.out_metric,
            d.run_every,
            aggregators.join(", ")
        );
    }
    Ok(())
}

async fn demo(db: &SimpleTsdb) -> Result<(), Box<dyn std::error::Error>> {
    println!("SimpleTSDB client demo");
    println!("======================");

    let mut rng = rand::thread_rng();
    let now = now_nanos();
    let metric = "demo.cpu.percent";

    let points: Vec<InsertPointRequest> = (0..600i64)
        .map(|i| {
            let value = 30.0 + 20.0 * (i as f64 * 0.01).sin() + rng.gen_range(-5.0..5.0);
            InsertPointRequest::new(metric, Point::new(value, now - i * SECOND_NANOS))
                .with_tag("host", format!("host-{}", i % 3))
        })
        .collect();

    println!("\n1. Inserting {} points...", points.len());
    db.insert_points(points).await?;

    println!("\n2. Querying the last 10 minutes for host-0...");
    let request = QueryPointsRequest::new(metric, now - 600 * SECOND_NANOS)
        .with_limit(5)
        .with_tag("host", "host-0");
    for point in db.query_points(&request).await? {
        println!("   {} -> {}", format_timestamp(point.timestamp), point.value);
    }

    println!("\n3. Querying 1 minute averages...");
    let mut window = Options::new();
    window.insert("every".to_string(), json!("1m"));
    let request = QueryPointsRequest::new(metric, now - 600 * SECOND_NANOS)
        .with_window(window.clone())
        .with_aggregator(AggregatorQuery::new("mean"));
    let averages = db.query_points(&request).await?;
    println!("   {} windows", averages.len());

    println!("\n4. Registering a downsampler...");
    let out_metric = format!("{}.1m", metric);
    let query = DownsampleQuery::new(window).with_aggregator(AggregatorQuery::new("mean"));
    db.add_downsampler(&Downsampler::new(metric, out_metric.as_str(), "1m", query)).await?;
    list_downsamplers(db).await?;

    println!("\n5. Cleaning up...");
    if let Some(id) = db
        .list_downsamplers()
        .await?
        .into_iter()
        .find(|d| d.out_metric == out_metric)
        .and_then(|d| d.id)
    {
        db.delete_downsampler(id).await?;
    }
    db.delete_points(&DeletePointsRequest::new(metric, now - 600 * SECOND_NANOS, now))
        .await?;

    println!("\nDemo completed successfully!");
    Ok(())
}
