use crate::models::AggregatedMetric;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print the ranked comparison in the specified format
pub fn print_ranking(metrics: &[AggregatedMetric], format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(metrics),
        OutputFormat::Json => print_json(metrics),
    }
}

/// Print the ranking as a plain text table, best model first
fn print_plain(metrics: &[AggregatedMetric]) {
    if metrics.is_empty() {
        println!("No result sheets found.");
        return;
    }

    println!(
        "{:<4} {:<40} {:<12} {:>9} {:>12} {:>12} {:>8} {:>12}",
        "#", "Model", "Provider", "Acc %", "Cost $/M", "Latency ms", "Err %", "Efficiency"
    );
    println!("{}", "-".repeat(115));

    for (rank, metric) in metrics.iter().enumerate() {
        println!(
            "{:<4} {:<40} {:<12} {:>9.2} {:>12.4} {:>12.1} {:>8.2} {:>12.5}",
            rank + 1,
            metric.model_name,
            metric.provider,
            metric.accuracy,
            metric.cost,
            metric.avg_latency,
            metric.error,
            metric.efficiency_index
        );
    }
}

/// Print the ranking as JSON
fn print_json(metrics: &[AggregatedMetric]) {
    match serde_json::to_string_pretty(metrics) {
        Ok(json) => println!("{}", json),
        Err(error) => eprintln!("Error serializing ranking to JSON: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_metrics() -> Vec<AggregatedMetric> {
        vec![
            AggregatedMetric {
                model_id: "gpt-4".to_string(),
                model_name: "gpt-4 - abcde".to_string(),
                provider: "openai".to_string(),
                accuracy: 80.0,
                cost: 10.0,
                avg_latency: 512.5,
                error: 2.5,
                efficiency_index: 0.32768,
            },
            AggregatedMetric {
                model_id: "nova-micro".to_string(),
                model_name: "nova-micro - 12345".to_string(),
                provider: "amazon".to_string(),
                accuracy: 62.0,
                cost: 0.175,
                avg_latency: 310.0,
                error: 0.0,
                efficiency_index: 5.234,
            },
        ]
    }

    #[test]
    fn test_plain_output() {
        print_plain(&create_test_metrics());
    }

    #[test]
    fn test_plain_output_empty() {
        print_plain(&[]);
    }

    #[test]
    fn test_json_output() {
        // Ensures serialization does not panic
        print_json(&create_test_metrics());
    }

    #[test]
    fn test_print_ranking_both_formats() {
        let metrics = create_test_metrics();
        print_ranking(&metrics, OutputFormat::Plain);
        print_ranking(&metrics, OutputFormat::Json);
    }
}
