//! Handler for `trellis analyze`.

use miette::Result;
use trellis_core::config::{GlobalConfig, Severity};
use trellis_resolver::analyze::{analyze, AnalyzeResult, NodeRef};
use trellis_resolver::diagnostics::unresolved;
use trellis_util::errors::TrellisError;
use trellis_util::progress::{status, status_error, status_warn};

use crate::cli::GraphArgs;

pub async fn exec(config: &GlobalConfig, args: &GraphArgs) -> Result<()> {
    let mut graphs = super::walk_graphs(config, args).await?;

    let mut result = AnalyzeResult::new();
    let mut missing: Vec<NodeRef> = Vec::new();
    for graph in &mut graphs {
        result.combine(analyze(graph));
        missing.extend(unresolved(graph));
    }

    let policy = &config.policy;
    if policy.downgrades == Severity::Ignore {
        result.downgrades.clear();
    }
    if policy.conflicts == Severity::Ignore {
        result.version_conflicts.clear();
    }
    if policy.cycles == Severity::Ignore {
        result.cycles.clear();
    }
    if policy.unresolved == Severity::Ignore {
        missing.clear();
    }

    print!("{result}");
    if !missing.is_empty() {
        println!("Unresolved ({}):", missing.len());
        for node in &missing {
            println!("  [{}] {}", node.framework, node.path);
        }
    }

    let findings = [
        ("downgrades", result.downgrades.len(), policy.downgrades),
        ("version conflicts", result.version_conflicts.len(), policy.conflicts),
        ("cycles", result.cycles.len(), policy.cycles),
        ("unresolved", missing.len(), policy.unresolved),
    ];

    let mut failed = Vec::new();
    for (label, count, severity) in findings {
        if count == 0 {
            continue;
        }
        match severity {
            Severity::Error => {
                status_error("Error", &format!("{label}: {count}"));
                failed.push(format!("{label}: {count}"));
            }
            Severity::Warn => status_warn("Warning", &format!("{label}: {count}")),
            Severity::Ignore => {}
        }
    }

    if !failed.is_empty() {
        return Err(TrellisError::Policy {
            message: failed.join(", "),
        }
        .into());
    }

    status(
        "Analyzed",
        &format!("{} graph(s) for {}", graphs.len(), args.root),
    );
    Ok(())
}
