//! Handler for `trellis tree`.

use miette::Result;
use trellis_core::config::GlobalConfig;
use trellis_resolver::analyze::analyze;

use crate::cli::GraphArgs;

pub async fn exec(config: &GlobalConfig, args: &GraphArgs, depth: Option<usize>) -> Result<()> {
    let mut graphs = super::walk_graphs(config, args).await?;
    let multiple = graphs.len() > 1;

    for graph in &mut graphs {
        // Dispositions are only final after analysis.
        analyze(graph);
        if multiple {
            println!("[{}]", graph.framework());
        }
        print!("{}", graph.print_tree(depth));
    }
    Ok(())
}
