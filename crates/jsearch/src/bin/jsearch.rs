// Copyright 2025 HyperZoekt Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jsearch::{
    load_config, ContainerSpec, DeclarationKind, DeclarationQuery, ElementKind, EngineConfig,
    LimitTo, MatchRule, MatchSink, MergeOpts, NameMatcher, Pattern, SearchEngine, SearchMatch,
    SearchScope,
};

#[derive(Parser, Debug)]
#[command(name = "jsearch", about = "Find Java declarations and references")]
struct Args {
    /// Text pattern, e.g. `HM`, `p.A.foo(int)` or `java.util.List<String>`
    pattern: String,
    /// Source folder to index (repeatable)
    #[arg(long = "root")]
    roots: Vec<PathBuf>,
    /// Jar or zip archive to index (repeatable)
    #[arg(long = "archive")]
    archives: Vec<PathBuf>,
    /// Element kind: type, class, interface, enum, annotation, record, method, field, constructor, package, element, module
    #[arg(long, default_value = "type")]
    kind: String,
    /// declarations, references, all, implementors, read, write
    #[arg(long, default_value = "all")]
    limit_to: String,
    /// Match rule flags, comma separated: exact, prefix, pattern, camel, camel-same, case, erasure, equivalent, raw
    #[arg(long, default_value = "exact")]
    rule: String,
    /// Restrict the search to the hierarchy of this qualified type
    #[arg(long)]
    hierarchy: Option<String>,
    /// List matching declarations from the index instead of searching
    #[arg(long)]
    list: bool,
    /// Emit JSON (NDJSON)
    #[arg(long)]
    json: bool,
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for persisted indices
    #[arg(long)]
    index_dir: Option<PathBuf>,
    #[arg(long)]
    index_threads: Option<usize>,
    /// Answer from whatever is indexed instead of waiting
    #[arg(long)]
    best_effort: bool,
}

struct PrintSink {
    json: bool,
    printed: usize,
}

impl MatchSink for PrintSink {
    fn accept(&mut self, m: SearchMatch) {
        self.printed += 1;
        if self.json {
            match serde_json::to_string(&m) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("failed to encode match: {}", e),
            }
        } else {
            println!("{}", m);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    if args.roots.is_empty() && args.archives.is_empty() {
        bail!("nothing to search: pass --root or --archive");
    }
    let config = load_config(
        EngineConfig::default(),
        MergeOpts {
            config_path: args.config.clone(),
            cli_index_dir: args.index_dir.clone(),
            cli_index_threads: args.index_threads,
            cli_best_effort: args.best_effort,
        },
    )?;
    let kind: ElementKind = args.kind.parse().map_err(anyhow::Error::msg)?;
    let limit_to: LimitTo = args.limit_to.parse().map_err(anyhow::Error::msg)?;
    let rule: MatchRule = args.rule.parse().map_err(anyhow::Error::msg)?;

    let engine = SearchEngine::new(config).context("failed to start search engine")?;
    let mut container = ContainerSpec::new("cli");
    for root in &args.roots {
        container = container.with_source_folder(root.canonicalize().unwrap_or_else(|_| root.clone()));
    }
    for archive in &args.archives {
        container = container.with_archive(archive.canonicalize().unwrap_or_else(|_| archive.clone()));
    }
    engine.registry().add_container(container)?;
    let opts = engine.default_options();

    let scope = match &args.hierarchy {
        Some(focus) => engine.hierarchy_scope(focus, false, &opts)?,
        None => SearchScope::Everything,
    };

    if args.list {
        let Some(decl_kind) = DeclarationKind::for_element(kind) else {
            bail!("--list does not support {:?} declarations", kind);
        };
        let query = DeclarationQuery::new(decl_kind, NameMatcher::new(&args.pattern, rule));
        let mut found = Vec::new();
        let n = engine.search_all_declarations(&query, &scope, &opts, &mut found)?;
        for (doc, decl) in &found {
            if args.json {
                println!("{}", serde_json::json!({ "document": doc, "declaration": decl }));
            } else {
                let container = decl.qualified_container();
                if container.is_empty() {
                    println!("{}  {}", decl.name, doc);
                } else {
                    println!("{}.{}  {}", container, decl.name, doc);
                }
            }
        }
        info!(declarations = n, "listing finished");
    } else {
        let pattern = Pattern::parse(&args.pattern, kind, limit_to, rule);
        let mut sink = PrintSink {
            json: args.json,
            printed: 0,
        };
        let stats = engine.search(&pattern, &scope, &opts, &mut sink)?;
        info!(
            matches = sink.printed,
            candidates = stats.candidate_documents,
            parse_failures = stats.parse_failures,
            "search finished"
        );
    }
    engine.shutdown();
    Ok(())
}
