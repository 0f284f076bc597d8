use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    /// The filepath to the SSA module to analyze
    pub input: String,
    /// Entry-point function; may be repeated, overrides the module's
    /// entry directives
    #[arg(short, long)]
    pub entry: Vec<String>,
    /// Write a GraphViz description of the lock graph to output/lockgraph.dot
    #[arg(short, long)]
    pub graph: bool,
    /// Render the HTML report into this directory (requires GraphViz)
    #[arg(long)]
    pub html: Option<String>,
    /// Print every witnessing path instead of the first few per edge
    #[arg(short, long)]
    pub verbose: bool,
}

impl Arguments {
    #[allow(dead_code)] // used when running tests
    pub fn new<S: Into<String>>(
        input: S,
        entry: Vec<String>,
        graph: bool,
        html: Option<String>,
        verbose: bool,
    ) -> Self {
        Self {
            input: input.into(),
            entry,
            graph,
            html,
            verbose,
        }
    }
}
