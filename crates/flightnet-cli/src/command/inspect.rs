use std::path::PathBuf;

use anyhow::Context;
use flightnet_evolution::persistence::JsonFileStore;
use flightnet_network::{WeightTensor, mutation::WEIGHT_RANGE};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Champion save file
    #[arg(long)]
    save_file: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct WeightStats {
    count: usize,
    min: f32,
    max: f32,
    mean: f32,
    saturated: usize,
}

impl WeightStats {
    #[expect(clippy::cast_precision_loss)]
    fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut stats = Self {
            count: 0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            mean: 0.0,
            saturated: 0,
        };
        let mut sum = 0.0;
        for value in values {
            stats.count += 1;
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
            if value <= *WEIGHT_RANGE.start() || value >= *WEIGHT_RANGE.end() {
                stats.saturated += 1;
            }
            sum += value;
        }
        if stats.count > 0 {
            stats.mean = sum / stats.count as f32;
        }
        stats
    }
}

fn layer_stats(weights: &WeightTensor, layer: usize) -> WeightStats {
    let topology = weights.topology();
    WeightStats::from_values(
        (0..topology.layer_size(layer))
            .flat_map(|neuron| weights.neuron(layer, neuron).iter().copied()),
    )
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg { save_file } = arg;

    let record = JsonFileStore::new(save_file)
        .read_record()
        .with_context(|| format!("Failed to read champion file: {}", save_file.display()))?;
    let weights = record
        .weight_tensor()
        .with_context(|| format!("Unusable champion in {}", save_file.display()))?;

    println!("Champion: {}", save_file.display());
    println!("  Format version: {}", record.format_version);
    println!("  Saved at: {}", record.saved_at);
    println!("  Topology: {}", record.topology);
    println!("  High score: {}", record.high_score);
    println!("  Generation: #{}", record.generation);

    let total = WeightStats::from_values(weights.values().iter().copied());
    println!("  Weights: {}", total.count);
    println!("    Min:       {:.3}", total.min);
    println!("    Max:       {:.3}", total.max);
    println!("    Mean:      {:.3}", total.mean);
    println!("    Saturated: {}", total.saturated);
    for layer in 1..weights.topology().layer_count() {
        let stats = layer_stats(&weights, layer);
        println!(
            "  Layer {layer}: {} weights, min {:.3}, max {:.3}, mean {:.3}, saturated {}",
            stats.count, stats.min, stats.max, stats.mean, stats.saturated
        );
    }

    Ok(())
}
