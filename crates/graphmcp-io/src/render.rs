use graphmcp_closure::ClosureResult;
use graphmcp_core::WeightTable;
use std::fmt::Write;

/// Per-hypothesis summary: name, p-value, adjusted p-value, decision.
pub fn result_table(result: &ClosureResult) -> String {
    let names = result.names();
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0).max("hypothesis".len());
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:<width$}  {:>10}  {:>10}  rejected",
        "hypothesis", "p-value", "adj. p"
    );
    for (i, name) in names.iter().enumerate() {
        let adj = match result.adjusted_pvalues()[i] {
            Some(p) => format!("{:.6}", p),
            None => "NA".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<width$}  {:>10.6}  {:>10}  {}",
            name,
            result.pvalues()[i],
            adj,
            if result.rejected()[i] { "yes" } else { "no" }
        );
    }
    let _ = writeln!(
        out,
        "\nalpha = {}, rejected {} of {}",
        result.alpha(),
        result.num_rejected(),
        names.len()
    );
    for w in result.warnings() {
        let _ = writeln!(out, "warning: {}", w);
    }
    if let Some(trace) = result.trace() {
        let _ = writeln!(out);
        for t in trace {
            let _ = writeln!(out, "{}", t);
        }
    }
    out
}

/// Intersection weights, one row per intersection hypothesis.
pub fn weight_table(table: &WeightTable) -> String {
    let labels: Vec<String> = table.subsets().iter().map(|s| s.label(table.names())).collect();
    let width =
        labels.iter().map(|l| l.chars().count()).max().unwrap_or(0).max("intersection".len());
    let mut out = String::new();

    let _ = write!(out, "{:<width$}", "intersection");
    for name in table.names() {
        let _ = write!(out, "  {:>8}", name);
    }
    let _ = writeln!(out);
    for (r, label) in labels.iter().enumerate() {
        // pad by chars, "∩" is multi-byte
        let pad = width - label.chars().count();
        let _ = write!(out, "{}{}", label, " ".repeat(pad));
        for w in table.weights().row(r).iter() {
            let _ = write!(out, "  {:>8.4}", w);
        }
        let _ = writeln!(out);
    }
    out
}
