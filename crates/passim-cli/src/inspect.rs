//! `passim info` and `passim search`.

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use passim_core::index::hnsw::persistence;
use passim_core::{HnswGraph, PassageTable, SearchService, ServingIndex};
use serde_json::json;
use std::path::Path;

use crate::OutputFormat;

/// Parses a vector from a JSON array or a comma-separated list.
pub fn parse_vector(s: &str) -> Result<Vec<f32>> {
    let s = s.trim();
    let vector: Vec<f32> = if s.starts_with('[') {
        serde_json::from_str(s).context("Invalid JSON vector")?
    } else {
        s.split(',')
            .map(|v| v.trim().parse::<f32>().context("Invalid float value"))
            .collect::<Result<_>>()?
    };
    if vector.is_empty() {
        anyhow::bail!("Empty query vector");
    }
    Ok(vector)
}

fn load_graph(path: &Path) -> Result<HnswGraph> {
    persistence::load_from_path(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Renders index metadata and graph shape.
pub fn info_table(path: &Path, graph: &HnswGraph) -> Table {
    let stats = graph.stats();
    let params = graph.params();
    let entry = stats
        .entry_point
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let levels = stats
        .nodes_per_level
        .iter()
        .enumerate()
        .map(|(level, count)| format!("L{level}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Property").fg(Color::Cyan),
        Cell::new("Value").fg(Color::Cyan),
    ]);
    let rows: [(&str, String); 11] = [
        ("File", path.display().to_string()),
        ("Nodes", stats.nodes.to_string()),
        ("Dimension", stats.dimension.to_string()),
        ("Metric", stats.metric.to_string()),
        ("M", params.max_connections.to_string()),
        ("ef_construction", params.ef_construction.to_string()),
        ("ef_search", params.ef_search.to_string()),
        ("Seed", params.seed.to_string()),
        ("Entry point", entry),
        ("Max level", stats.max_level.to_string()),
        ("Avg degree (L0)", format!("{:.2}", stats.avg_degree_level0)),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    if !levels.is_empty() {
        table.add_row(vec![Cell::new("Nodes per level"), Cell::new(levels)]);
    }
    table
}

/// Prints index info.
pub fn info(path: &Path, format: OutputFormat) -> Result<()> {
    let graph = load_graph(path)?;
    match format {
        OutputFormat::Table => {
            println!("Passim Index: {}", path.display());
            println!("{}", info_table(path, &graph));
        }
        OutputFormat::Json => {
            let params = graph.params();
            let value = json!({
                "path": path.display().to_string(),
                "params": {
                    "m": params.max_connections,
                    "ef_construction": params.ef_construction,
                    "ef_search": params.ef_search,
                    "max_level": params.max_level,
                    "seed": params.seed,
                },
                "stats": graph.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

/// One printed search result.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchRow {
    pub rank: usize,
    pub node: Option<usize>,
    pub id: String,
    pub passage: Option<String>,
    pub score: f32,
}

/// Searches `index_path`, joining passages when a table is given.
pub fn search_rows(
    index_path: &Path,
    passages_path: Option<&Path>,
    query: &[f32],
    k: usize,
    ef: Option<usize>,
) -> Result<Vec<SearchRow>> {
    let graph = load_graph(index_path)?;

    let Some(passages_path) = passages_path else {
        let ef = ef.unwrap_or(graph.params().ef_search);
        let hits = graph.search(query, k, ef)?;
        return Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| SearchRow {
                rank: i + 1,
                node: Some(hit.id),
                id: hit.id.to_string(),
                passage: None,
                score: hit.score,
            })
            .collect());
    };

    let passages = PassageTable::from_tsv_path(passages_path)
        .with_context(|| format!("Failed to load {}", passages_path.display()))?;
    let service = SearchService::new(ServingIndex::new(graph, passages)?);
    let hits = service.search(query, k, ef)?;
    Ok(hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| SearchRow {
            rank: i + 1,
            node: None,
            id: hit.id,
            passage: Some(hit.text),
            score: hit.score,
        })
        .collect())
}

/// Prints search results.
pub fn search(
    index_path: &Path,
    passages_path: Option<&Path>,
    query: &[f32],
    k: usize,
    ef: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let rows = search_rows(index_path, passages_path, query, k, ef)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No results.");
        return Ok(());
    }
    let mut table = new_table();
    let joined = passages_path.is_some();
    let mut header = vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new(if joined { "id" } else { "node" }).fg(Color::Cyan),
        Cell::new("score").fg(Color::Cyan),
    ];
    if joined {
        header.push(Cell::new("passage").fg(Color::Cyan));
    }
    table.set_header(header);
    for row in rows {
        let mut cells = vec![
            Cell::new(row.rank),
            Cell::new(&row.id),
            Cell::new(format!("{:.4}", row.score)),
        ];
        if let Some(passage) = row.passage {
            cells.push(Cell::new(passage));
        }
        table.add_row(cells);
    }
    println!("{table}");
    Ok(())
}
