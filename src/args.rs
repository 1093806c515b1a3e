use clap::Parser;

/// Joins election results with boundary data and derives vote shares, swings and residuals.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the analysis: the sources, how their keys are
    /// normalized, how they are joined and which metrics are derived.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path, optional) A reference summary in JSON format. If provided, the computed
    /// summary must match it exactly.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory, 'stdout' or empty) Where to write the outputs. Overrides the output
    /// directory of the configuration. With 'stdout', only the summary is printed.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
