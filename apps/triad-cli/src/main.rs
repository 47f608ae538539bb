use std::env;

use tracing_subscriber::EnvFilter;

use triad_core::config::Config;
use triad_core::{BackendKind, SearchQuery, SearchResult};
use triad_hybrid::HybridRetriever;

const USAGE: &str = "Usage: triad <query|keyword|graph|status> [args...]
  query   \"<text>\" [--top-k N] [--backends vector,graph,keyword] [--collection NAME]
  keyword \"<text>\" [--top-k N]
  graph   \"<text>\" [--top-k N]
  status";

struct Args {
    cmd: String,
    text: Option<String>,
    top_k: Option<usize>,
    backends: Option<Vec<String>>,
    collection: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    let mut parsed = Args { cmd, text: None, top_k: None, backends: None, collection: None };
    let mut rest = args.into_iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--top-k" | "-k" => {
                let value = rest.next().ok_or_else(|| anyhow::anyhow!("--top-k needs a value"))?;
                parsed.top_k = Some(value.parse()?);
            }
            "--backends" => {
                let value = rest.next().ok_or_else(|| anyhow::anyhow!("--backends needs a value"))?;
                parsed.backends = Some(value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());
            }
            "--collection" => parsed.collection = rest.next(),
            _ if parsed.text.is_none() => parsed.text = Some(arg),
            other => anyhow::bail!("unexpected argument '{other}'"),
        }
    }
    Ok(parsed)
}

fn print_results(results: &[SearchResult]) {
    println!("Found {} results", results.len());
    for (i, r) in results.iter().enumerate() {
        let sources: Vec<&str> = r.sources.iter().map(BackendKind::as_str).collect();
        let flag = if r.is_simulated() { " [simulated]" } else { "" };
        println!("\n  {}. score={:.4}  id={}  sources={}{}", i + 1, r.score, r.document_id, sources.join("+"), flag);
        let snippet: String = r.content.chars().take(160).collect();
        println!("     {}", snippet.replace('\n', " "));
        for related in &r.related_documents {
            println!("     -> {} ({})", related.document_id, related.relation);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).with_writer(std::io::stderr).init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.engine()?;
    let args = parse_args()?;
    let top_k = args.top_k.unwrap_or(settings.default_top_k);
    let text = || args.text.clone().ok_or_else(|| anyhow::anyhow!("missing query text\n{USAGE}"));

    let retriever = HybridRetriever::from_config(&settings)?;
    match args.cmd.as_str() {
        "query" => {
            let mut query = SearchQuery::new(text()?).with_top_k(top_k);
            if let Some(names) = &args.backends { query = query.with_backend_names(names.as_slice())?; }
            if let Some(collection) = &args.collection { query = query.with_collection(collection.clone()); }
            print_results(&retriever.hybrid_search(&query).await?);
        }
        "keyword" => print_results(&retriever.keyword_search(&text()?, top_k, None).await?),
        "graph" => print_results(&retriever.graph_search(&text()?, top_k).await?),
        "status" => retriever.engine().registry().ensure_probed().await,
        other => { eprintln!("Unknown command: {other}\n{USAGE}"); std::process::exit(1); }
    }
    println!("\n{}", serde_json::to_string_pretty(&retriever.backend_status())?);
    Ok(())
}
