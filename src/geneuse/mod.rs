//! V/J gene-usage aggregation for one repertoire.


use crate::store::ContextStore;
use crate::tsv;
use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ----------------------------------------------------------------------------
// Params

#[derive(Clone, Debug, Default)]
pub struct Params {
    pub repertoire: String,
    /// Keep rearrangements with an unresolved gene, bucketed as `X`.
    pub include_unknown: bool,
    /// Keep family-only calls (no gene number), bucketed as `<family>-X`.
    pub include_family_only: bool,
}

// ----------------------------------------------------------------------------
// Usage

/// Aggregated counts per V/J gene pair.
///
/// Three parallel arrays with one entry per pair, in key order. The shape is
/// exactly what the charting client consumes, so no transformation happens
/// downstream.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Usage {
    pub v_genes: Vec<String>,
    pub j_genes: Vec<String>,
    pub counts: Vec<u64>,
}

/// Sum rearrangement counts for every V/J gene pairing in a repertoire.
pub fn gene_use(crs: &ContextStore, params: &Params) -> Result<Usage, Report> {
    crs.require(&params.repertoire)?;
    let mut reader = tsv::Reader::new(crs.open_repertoire(&params.repertoire)?, 0);

    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    while let Some(r) = reader.read_next()? {
        let Some(v) = normalize_gene(&r.v_resolved, params) else { continue };
        let Some(j) = normalize_gene(&r.j_resolved, params) else { continue };
        *counts.entry((v, j)).or_insert(0) += r.count;
    }

    let mut usage = Usage::default();
    for ((v, j), count) in counts {
        usage.v_genes.push(v);
        usage.j_genes.push(j);
        usage.counts.push(count);
    }
    Ok(usage)
}

/// Strip the allele suffix and decide whether the call is usable.
fn normalize_gene(resolved: &str, params: &Params) -> Option<String> {
    let resolved = resolved.trim();
    if resolved.is_empty() {
        return params.include_unknown.then(|| "X".to_string());
    }

    // remove allele (*01 and friends)
    let gene = match resolved.rfind('*') {
        Some(at) => &resolved[..at],
        None => resolved,
    };

    // family-only calls carry no gene number
    if !gene.contains('-') {
        return params.include_family_only.then(|| format!("{gene}-X"));
    }

    Some(gene.to_string())
}
