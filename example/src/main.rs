use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::*;
use ldatopics::{
    BleiLaffertyScorer, Dataset, ForwardIndex, LdaConfig, LdaCvb, MemoryIndex, TermId, TermScorer,
    TopicModel, DEFAULT_TOP_K,
};

//
// Built-in corpus: short student essays on two prompts, smoking in public
// places and part-time jobs for students.
//
const DOCUMENTS: &[&str] = &[
    "Smoking should be banned in all restaurants because second hand smoke harms other diners",
    "I think a part time job teaches students responsibility and how to manage money",
    "Public smoking exposes children to smoke and the health risks of cigarettes",
    "Students with a part time job learn to balance work and study and earn their own money",
    "Restaurants that allow smoking force staff to breathe smoke every shift, smoking must be banned",
    "A job while at college gives students work experience that employers value",
    "I think cigarettes and smoke in public places are a health problem for everyone",
    "Part time work can distract students from study, but I think the money and experience help",
];

#[derive(Parser, Debug)]
#[command(name = "ldatopics-demo", about = "Run CVB0 topic inference and print the topics")]
struct Args {
    /// Corpus file, one document per line. Defaults to a small built-in corpus.
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// JSON file with an LdaConfig. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    topics: Option<usize>,

    #[arg(long)]
    alpha: Option<f64>,

    #[arg(long)]
    beta: Option<f64>,

    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    tolerance: Option<f64>,

    #[arg(long)]
    threads: Option<usize>,

    /// Where the model is saved and reloaded from.
    #[arg(long, default_value = "lda-cvb0.model")]
    model: PathBuf,

    /// Terms printed per topic.
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top: usize,

    /// Documents whose topic distribution is printed.
    #[arg(long, num_args = 1.., default_values_t = [0usize, 1])]
    docs: Vec<usize>,
}

impl Args {
    fn lda_config(&self) -> Result<LdaConfig, Box<dyn Error>> {
        let mut cfg = match &self.config {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => LdaConfig::default(),
        };
        if let Some(k) = self.topics {
            cfg.num_topics = k;
        }
        if let Some(alpha) = self.alpha {
            cfg.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            cfg.beta = beta;
        }
        if let Some(n) = self.iterations {
            cfg.num_iterations = n;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if self.tolerance.is_some() {
            cfg.convergence_tolerance = self.tolerance;
        }
        if let Some(threads) = self.threads {
            cfg.num_threads = threads;
        }
        Ok(cfg)
    }
}

fn load_index(corpus: Option<&PathBuf>) -> Result<MemoryIndex, Box<dyn Error>> {
    let index = match corpus {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            MemoryIndex::from_texts(&lines)
        }
        None => MemoryIndex::from_texts(DOCUMENTS),
    };
    Ok(index)
}

fn topics_table(
    title: &str,
    model: &TopicModel,
    index: &MemoryIndex,
    k: usize,
    scorer: &dyn TermScorer,
) -> Result<Table, Box<dyn Error>> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Topic ID").fg(Color::Red),
            Cell::new(title).fg(Color::White),
        ]);
    for topic in 0..model.num_topics() {
        let words = model
            .top_k_with(topic, k, scorer)?
            .into_iter()
            .map(|(term, score)| format!("{}[{:.4}]", term_text(index, term), score))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![Cell::new(topic), Cell::new(words)]);
    }
    Ok(table)
}

fn term_text(index: &MemoryIndex, term: TermId) -> &str {
    index.term_text(term).unwrap_or("<unknown>")
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let config = args.lda_config()?;
    log::debug!("Using {config:?}");
    let index = load_index(args.corpus.as_ref())?;
    let dataset = Dataset::build(&index)?;

    let mut lda = LdaCvb::new(&dataset, config)?;
    println!(
        "Running CVB0 (K={}, iterations={})...",
        lda.config().num_topics,
        lda.config().num_iterations
    );
    let summary = lda.run();
    println!(
        "Ran {} iterations (converged: {}, max gamma change {:.3e})",
        summary.iterations, summary.converged, summary.max_gamma_change
    );
    lda.save(&args.model)?;

    let model = TopicModel::load(&args.model)?;
    println!(
        "{}",
        topics_table(
            "Top terms by probability",
            &model,
            &index,
            args.top,
            &ldatopics::ProbabilityScorer
        )?
    );

    let scorer = BleiLaffertyScorer::new(&model)?;
    println!(
        "{}",
        topics_table("Top terms by Blei-Lafferty score", &model, &index, args.top, &scorer)?
    );

    for &doc in &args.docs {
        match model.topic_distribution(doc) {
            Ok(dist) => println!("Document {doc}: {dist:.4?}"),
            Err(e) => eprintln!("Document {doc}: {e}"),
        }
    }

    println!("Elapsed: {:.4} seconds", start.elapsed().as_secs_f64());
    Ok(())
}
