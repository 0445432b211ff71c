use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use binast_core::{
    corpus::{GlobalStringEntry, PathSuffixRecord, ProbTables, StringWindowSummary, global_dictionary},
    entropy::{EntropyCoder, WindowProbTables, prob_table::FreqTable},
    error::CoreError,
    external::{self, RawDeclaration, RawValue},
    path_suffix::{self, PathInterner},
    schema::{Declaration, Schema},
    string_window::{HitCounter, StringWindows},
    types::{FieldType, FieldTypeKind, IdentTag, PrimitiveKind, TypeRegistry},
    value::Value,
    visitor::{self, Handler, Path as WalkPath},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod store;
use store::ResultStore;

/// Corpus analysis and entropy-coding driver for the AST compressor core.
#[derive(Parser, Debug)]
struct Args {
    /// Directory containing `schema.json` and the corpus's typed-tree
    /// `*.json` scripts.
    #[arg(long)]
    script_dir: PathBuf,

    /// Output directory for corpus artifacts and entropy-coded files.
    #[arg(long)]
    result_dir: PathBuf,

    #[arg(long)]
    pretty_print: bool,
    #[arg(long)]
    string_window: bool,
    #[arg(long)]
    path_suffix: bool,
    #[arg(long)]
    global_strings: bool,
    #[arg(long)]
    entropy_code: bool,

    /// Comma-separated string-window cache sizes, each <= 4096.
    #[arg(long, value_delimiter = ',', default_value = "64")]
    string_window_sizes: Vec<usize>,

    /// Path-suffix slice count, 1..=3.
    #[arg(long, default_value_t = 1)]
    path_suffix_length: usize,

    /// Array-index collapse threshold for path-suffix leaf keys (spec.md
    /// §9's first Open Question).
    #[arg(long, default_value_t = 4)]
    index_collapse_threshold: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if !(args.pretty_print || args.string_window || args.path_suffix || args.global_strings || args.entropy_code) {
        tracing::error!("at least one of --pretty-print/--string-window/--path-suffix/--global-strings/--entropy-code is required");
        return ExitCode::FAILURE;
    }

    if args.path_suffix_length == 0 || args.path_suffix_length > 3 {
        tracing::error!("--path-suffix-length must be in 1..=3");
        return ExitCode::FAILURE;
    }
    if args.string_window_sizes.iter().any(|&s| s == 0 || s > 4096) {
        tracing::error!("--string-window-sizes entries must be in 1..=4096");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let store = ResultStore::open(&args.result_dir);
    let writes = args.string_window || args.path_suffix || args.global_strings || args.entropy_code;
    if writes && !store.is_writable() {
        return Err(format!("result store `{}` has no WRITABLE sentinel", args.result_dir.display()).into());
    }

    let schema_path = args.script_dir.join("schema.json");
    let raw_decls: Vec<RawDeclaration> = serde_json::from_reader(fs::File::open(&schema_path)?)?;
    let (schema, _registry) = external::build_schema(raw_decls).map_err(CoreError::Schema)?;
    tracing::info!("loaded schema with {} declarations", schema.declarations().count());

    // Construction goes through a `TypeRegistry`; this scratch one only
    // ever mints the single root handle the visitor needs.
    let root_name = schema
        .declarations()
        .find(|d| matches!(d, Declaration::Iface { is_node: true, .. }))
        .map(|d| d.name().clone())
        .ok_or("schema has no root (isNode) interface")?;
    let root_iface = TypeRegistry::new().make_iface(root_name);

    let scripts = discover_scripts(&args.script_dir)?;
    tracing::info!("discovered {} corpus scripts", scripts.len());

    if args.pretty_print {
        run_pretty_print(&schema, root_iface.clone(), &scripts)?;
    }
    if args.path_suffix {
        run_path_suffix(&schema, root_iface.clone(), &scripts, args, &store)?;
    }
    if args.string_window {
        run_string_window(&schema, root_iface.clone(), &scripts, args, &store)?;
    }
    if args.global_strings {
        run_global_strings(&schema, root_iface.clone(), &scripts, &store)?;
    }
    if args.entropy_code {
        run_entropy_code(&schema, root_iface, &scripts, args, &store)?;
    }

    Ok(())
}

fn discover_scripts(script_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(script_dir)? {
        let path = entry?.path();
        let is_schema = path.file_name().and_then(|n| n.to_str()) == Some("schema.json");
        if path.extension().is_some_and(|ext| ext == "json") && !is_schema {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn load_tree(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let raw: RawValue = serde_json::from_reader(fs::File::open(path)?)?;
    Ok(external::lower_value(raw)?)
}

struct PrettyPrinter {
    depth_marker: String,
}

impl Handler for PrettyPrinter {
    fn begin(&mut self, loc: &WalkPath) -> Result<(), CoreError> {
        let frame = loc.top();
        println!(
            "{}{}: {} = {}",
            self.depth_marker.repeat(loc.depth().saturating_sub(1)),
            frame.key,
            frame.shape.ty,
            frame.value
        );
        Ok(())
    }

    fn end(&mut self, _loc: &WalkPath) -> Result<(), CoreError> {
        Ok(())
    }
}

fn run_pretty_print(schema: &Schema, root_iface: FieldType, scripts: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for script in scripts {
        println!("--- {} ---", script.display());
        let tree = load_tree(script)?;
        let mut printer = PrettyPrinter { depth_marker: "  ".into() };
        if let Err(err) = visitor::visit(schema, root_iface.clone(), &tree, &mut printer) {
            tracing::error!(file = %script.display(), "{err}");
        }
    }
    Ok(())
}

struct PathSuffixCollector<'s> {
    schema: &'s Schema,
    length: usize,
    collapse_threshold: usize,
    interner: PathInterner,
    freqs: HashMap<String, FreqTable>,
}

impl<'s> Handler for PathSuffixCollector<'s> {
    fn begin(&mut self, loc: &WalkPath) -> Result<(), CoreError> {
        let frame = loc.top();
        let Some(suffix) = path_suffix::for_location(self.schema, loc, self.length, self.collapse_threshold, &mut self.interner) else {
            return Ok(());
        };
        let suffix_key = suffix.key_string().to_string();

        if frame.shape.type_set.len() > 1 {
            let key = format!("{suffix_key}#type");
            let alphabet: Vec<String> = frame.shape.type_set.iter().map(|t| t.to_string()).collect();
            let freq = self
                .freqs
                .entry(key)
                .or_insert_with(|| FreqTable::new(alphabet));
            freq.record(frame.shape.index);
        }

        if let Some(tag_idx) = path_suffix::value_tag_and_index(self.schema, &frame.shape.ty, frame.value) {
            let key = format!("{suffix_key}#{}", tag_idx.tag);
            let freq = self
                .freqs
                .entry(key)
                .or_insert_with(|| FreqTable::new(tag_idx.alphabet.clone()));
            freq.record(tag_idx.index);
        }
        Ok(())
    }

    fn end(&mut self, _loc: &WalkPath) -> Result<(), CoreError> {
        Ok(())
    }
}

fn run_path_suffix(
    schema: &Schema,
    root_iface: FieldType,
    scripts: &[PathBuf],
    args: &Args,
    store: &ResultStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = PathSuffixCollector {
        schema,
        length: args.path_suffix_length,
        collapse_threshold: args.index_collapse_threshold,
        interner: PathInterner::new(),
        freqs: HashMap::new(),
    };

    let mut errors = 0u64;
    for script in scripts {
        let tree = load_tree(script)?;
        if let Err(err) = visitor::visit(schema, root_iface.clone(), &tree, &mut collector) {
            tracing::error!(file = %script.display(), "{err}");
            errors += 1;
        }
    }

    let records: Vec<PathSuffixRecord> = collector
        .freqs
        .iter()
        .map(|(key, freq)| PathSuffixRecord::from_freq(key.clone(), freq))
        .collect();
    store.write_json(&format!("path-suffix/{}/ALL.json", args.path_suffix_length), &records)?;
    tracing::info!(files = scripts.len(), errors, "path-suffix stage complete");
    Ok(())
}

struct StringWindowCollector {
    windows: StringWindows,
    ident_counter: HitCounter,
    prop_counter: HitCounter,
    raw_counter: HitCounter,
}

impl Handler for StringWindowCollector {
    fn begin(&mut self, loc: &WalkPath) -> Result<(), CoreError> {
        let frame = loc.top();
        match frame.shape.ty.kind() {
            FieldTypeKind::Ident(IdentTag::Ident) => {
                if let Value::Identifier(id) = frame.value {
                    let pos = self.windows.ident.lookup(&id.name);
                    self.ident_counter.record(pos);
                }
            }
            FieldTypeKind::Ident(IdentTag::Prop) => {
                if let Value::Identifier(id) = frame.value {
                    let pos = self.windows.prop.lookup(&id.name);
                    self.prop_counter.record(pos);
                }
            }
            FieldTypeKind::Primitive(PrimitiveKind::Str) => {
                if let Value::Str(s) = frame.value {
                    let pos = self.windows.raw.lookup(s);
                    self.raw_counter.record(pos);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, _loc: &WalkPath) -> Result<(), CoreError> {
        Ok(())
    }
}

fn run_string_window(
    schema: &Schema,
    root_iface: FieldType,
    scripts: &[PathBuf],
    args: &Args,
    store: &ResultStore,
) -> Result<(), Box<dyn std::error::Error>> {
    for &size in &args.string_window_sizes {
        let mut collector = StringWindowCollector {
            windows: StringWindows::new(size),
            ident_counter: HitCounter::new(size),
            prop_counter: HitCounter::new(size),
            raw_counter: HitCounter::new(size),
        };

        let mut errors = 0u64;
        for script in scripts {
            let tree = load_tree(script)?;
            if let Err(err) = visitor::visit(schema, root_iface.clone(), &tree, &mut collector) {
                tracing::error!(file = %script.display(), "{err}");
                errors += 1;
            }
        }

        let summary = StringWindowSummary {
            window_size: size,
            idents: collector.ident_counter.summary_rows().into_iter().map(|(_, c)| c).collect(),
            props: collector.prop_counter.summary_rows().into_iter().map(|(_, c)| c).collect(),
            strings: collector.raw_counter.summary_rows().into_iter().map(|(_, c)| c).collect(),
        };
        store.write_json(&format!("string-window/{size}/ALL.json"), &summary)?;
        tracing::info!(window_size = size, files = scripts.len(), errors, "string-window stage complete");
    }
    Ok(())
}

struct GlobalStringsCollector {
    counts: HashMap<String, (u64, u64, u64)>,
}

impl Handler for GlobalStringsCollector {
    fn begin(&mut self, loc: &WalkPath) -> Result<(), CoreError> {
        let frame = loc.top();
        match frame.shape.ty.kind() {
            FieldTypeKind::Ident(IdentTag::Ident) => {
                if let Value::Identifier(id) = frame.value {
                    self.counts.entry(id.name.clone()).or_default().0 += 1;
                }
            }
            FieldTypeKind::Ident(IdentTag::Prop) => {
                if let Value::Identifier(id) = frame.value {
                    self.counts.entry(id.name.clone()).or_default().1 += 1;
                }
            }
            FieldTypeKind::Primitive(PrimitiveKind::Str) => {
                if let Value::Str(s) = frame.value {
                    self.counts.entry(s.clone()).or_default().2 += 1;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, _loc: &WalkPath) -> Result<(), CoreError> {
        Ok(())
    }
}

fn run_global_strings(
    schema: &Schema,
    root_iface: FieldType,
    scripts: &[PathBuf],
    store: &ResultStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = GlobalStringsCollector { counts: HashMap::new() };
    let mut errors = 0u64;
    for script in scripts {
        let tree = load_tree(script)?;
        if let Err(err) = visitor::visit(schema, root_iface.clone(), &tree, &mut collector) {
            tracing::error!(file = %script.display(), "{err}");
            errors += 1;
        }
    }

    let mut entries: Vec<GlobalStringEntry> = collector
        .counts
        .into_iter()
        .map(|(str, (ident_count, prop_count, raw_count))| GlobalStringEntry {
            str,
            ident_count,
            prop_count,
            raw_count,
            total_count: ident_count + prop_count + raw_count,
        })
        .collect();
    entries.sort_by(|a, b| b.total_count.cmp(&a.total_count));

    store.write_json("global-strings/ALL.json", &entries)?;
    tracing::info!(files = scripts.len(), errors, distinct = entries.len(), "global-strings stage complete");
    Ok(())
}

fn run_entropy_code(
    schema: &Schema,
    root_iface: FieldType,
    scripts: &[PathBuf],
    args: &Args,
    store: &ResultStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut records = Vec::new();
    for len in [1usize, 2] {
        if let Ok(recs) = store.read_json::<Vec<PathSuffixRecord>>(&format!("path-suffix/{len}/ALL.json")) {
            records.extend(recs);
        }
    }
    if records.is_empty() {
        return Err("no path-suffix artifacts found; run --path-suffix first".into());
    }
    let path_tables = ProbTables::from_records(&records)?;

    let window_size = *args.string_window_sizes.first().unwrap_or(&64);
    let window_summary: StringWindowSummary = store.read_json(&format!("string-window/{window_size}/ALL.json"))?;
    let window_tables = WindowProbTables {
        ident: window_summary.ident_table()?,
        prop: window_summary.prop_table()?,
        raw: window_summary.raw_table()?,
    };

    let global_entries: Vec<GlobalStringEntry> = store.read_json("global-strings/ALL.json")?;
    let global_dict = global_dictionary(&global_entries);

    let mut errors = 0u64;
    for script in scripts {
        let tree = load_tree(script)?;
        let mut coder = EntropyCoder::new(
            schema,
            &path_tables,
            &window_tables,
            &global_dict,
            window_size,
            args.index_collapse_threshold,
        );
        match coder.encode_file(root_iface.clone(), &tree) {
            Ok(()) => {
                let total = coder.total_size_bytes()?;
                println!(
                    "{}: BinAST --> {total} bytes // {} bits",
                    script.display(),
                    coder.accounting().total_bits()
                );
                for (category, bits) in coder.accounting().categories() {
                    let symbols = coder.accounting().symbols(category);
                    println!("    {category}: {bits:.2} bits / {symbols} symbols");
                }

                let stem = script.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
                store.write_bytes(&format!("entropy-code/{stem}.bin"), &coder.encoded_payload())?;
            }
            Err(err) => {
                tracing::error!(file = %script.display(), "{err}");
                errors += 1;
            }
        }
    }
    tracing::info!(files = scripts.len(), errors, "entropy-code stage complete");
    Ok(())
}
