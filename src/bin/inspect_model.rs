use anyhow::{Context, Result};
use emotify::config::DetectionConfig;
use emotify::playlist::playlist_for_name;
use emotify::types::EmotionLabel;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::env;
use std::path::PathBuf;

/// Number of classes in a `[1, 4 + nc, N]` (or transposed) detection output.
fn class_count(dims: &[i64]) -> Option<i64> {
    let &[_, a, b] = dims else {
        return None;
    };
    let features = if a > 0 && (b <= 0 || a < b) { a } else { b };
    (features > 4).then(|| features - 4)
}

/// Parses the `names` metadata exporters embed, e.g. `{0: 'anger', 1: 'content'}`.
fn parse_names(raw: &str) -> Vec<(usize, String)> {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|entry| {
            let (id, name) = entry.split_once(':')?;
            let id = id.trim().parse().ok()?;
            let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
            Some((id, name.to_string()))
        })
        .collect()
}

fn main() -> Result<()> {
    let model_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| DetectionConfig::default().model_path);
    println!("Inspecting model: {}", model_path.display());

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level1)?
        .with_intra_threads(1)?
        .commit_from_file(&model_path)
        .with_context(|| format!("Failed to load {}", model_path.display()))?;

    println!("\n--- Inputs ---");
    for (i, input) in session.inputs.iter().enumerate() {
        println!("#{}: Name: {}", i, input.name);
        println!("    Type: {:?}", input.input_type);
    }

    println!("\n--- Outputs ---");
    for (i, output) in session.outputs.iter().enumerate() {
        println!("#{}: Name: {}", i, output.name);
        println!("    Type: {:?}", output.output_type);
    }

    let classes = session
        .outputs
        .first()
        .and_then(|o| o.output_type.tensor_shape())
        .and_then(|shape| class_count(shape));
    match classes {
        Some(n) => {
            println!("\nClasses: {}", n);
            if n as usize == EmotionLabel::ALL.len() {
                let names: Vec<&str> = EmotionLabel::ALL.iter().map(|l| l.as_str()).collect();
                println!("Labels: {}", names.join(", "));
            } else {
                println!("Expected {} emotion classes; ids past the end show as numbers", EmotionLabel::ALL.len());
            }
        }
        None => println!("\nClass count could not be inferred from the first output"),
    }

    let names = session.metadata()?.custom("names")?;
    match names {
        Some(raw) => {
            println!("\n--- Embedded class names ---");
            for (id, name) in parse_names(&raw) {
                let playlist = playlist_for_name(&name).unwrap_or("no playlist");
                println!("{:>3}: {:<10} -> {}", id, name, playlist);
            }
        }
        None => println!("\nNo class names embedded in the model metadata"),
    }

    Ok(())
}
