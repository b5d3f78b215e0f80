use sn_core::{ArticleDraft, ArticleStorage};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct DedupResult {
    /// Drafts whose fingerprint is neither stored nor repeated earlier in the batch.
    pub fresh: Vec<ArticleDraft>,
    pub duplicates: usize,
}

/// Drops drafts already persisted, using one batched lookup, and repeats
/// within the batch (first occurrence wins).
///
/// This is a filter only: when the lookup fails every in-batch-unique draft
/// passes through and the idempotent upsert decides.
pub async fn filter_new(storage: &dyn ArticleStorage, drafts: Vec<ArticleDraft>) -> DedupResult {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    let mut unique = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if seen.insert(draft.fingerprint.clone()) {
            unique.push(draft);
        } else {
            debug!(fingerprint = %draft.fingerprint, source = %draft.source_id, "Duplicate within batch");
            duplicates += 1;
        }
    }

    if unique.is_empty() {
        return DedupResult { fresh: unique, duplicates };
    }

    let fingerprints: Vec<String> = unique.iter().map(|d| d.fingerprint.clone()).collect();
    let existing = match storage.existing_fingerprints(&fingerprints).await {
        Ok(existing) => existing,
        Err(e) => {
            warn!(error = %e, "Fingerprint lookup failed; relying on idempotent commit");
            HashSet::new()
        }
    };

    let mut fresh = Vec::with_capacity(unique.len());
    for draft in unique {
        if existing.contains(&draft.fingerprint) {
            duplicates += 1;
        } else {
            fresh.push(draft);
        }
    }
    DedupResult { fresh, duplicates }
}
