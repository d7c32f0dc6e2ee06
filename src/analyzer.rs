//! The analysis pipeline.
//!
//! `analyze` ties the stages together: walk the archive, decode each class
//! entry (through a per-request cache), keep the controller classes,
//! compose mappings, classify mutation, collect validation, assemble the
//! report. Entries are processed in archive order in batches fanned out
//! over rayon; the cancellation flag and the wall-clock budget are checked
//! at entry granularity.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::classfile::{self, ClassView};
use crate::error::{AnalyzeError, Result};
use crate::mapping::{self, ClassMapping, MethodMapping};
use crate::mutation::{self, TransactionFacts};
use crate::report::{ApiEndpoint, ApiReport, MethodDetails, TransactionAttributes};
use crate::validation;
use crate::walker::{ClassEntries, ClassEntry};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Wall-clock budget for the whole run.
    pub timeout: Duration,
    /// Cooperative cancellation flag; set it to abort at the next entry.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cancel: None,
        }
    }
}

/// Analyzes a WAR archive with default options.
pub fn analyze(war_path: &Path) -> Result<ApiReport> {
    analyze_with_options(war_path, &AnalyzeOptions::default())
}

pub fn analyze_with_options(war_path: &Path, options: &AnalyzeOptions) -> Result<ApiReport> {
    let started = Instant::now();
    let mut entries = ClassEntries::open(war_path)?;
    let cache = DecodeCache::default();
    let mut apis: Vec<ApiEndpoint> = Vec::new();
    let mut scanned = 0usize;

    loop {
        check_limits(options, started)?;

        let batch: Vec<ClassEntry> = entries.by_ref().take(BATCH_SIZE).collect();
        if batch.is_empty() {
            break;
        }
        scanned += batch.len();

        let batch_endpoints: Vec<Vec<ApiEndpoint>> = batch
            .par_iter()
            .map(|entry| {
                if is_cancelled(options) {
                    return Vec::new();
                }
                match cache.get_or_decode(entry) {
                    Some(view) if mapping::is_controller(&view) => endpoints_of_class(&view),
                    _ => Vec::new(),
                }
            })
            .collect();

        for mut endpoints in batch_endpoints {
            apis.append(&mut endpoints);
        }
    }
    check_limits(options, started)?;

    let war_file_name = war_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| war_path.display().to_string());

    debug!(
        war = %war_file_name,
        scanned,
        endpoints = apis.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analysis finished"
    );

    Ok(ApiReport::assemble(war_file_name, apis))
}

fn check_limits(options: &AnalyzeOptions, started: Instant) -> Result<()> {
    if is_cancelled(options) {
        return Err(AnalyzeError::Cancelled);
    }
    if started.elapsed() >= options.timeout {
        return Err(AnalyzeError::Timeout {
            limit_secs: options.timeout.as_secs(),
        });
    }
    Ok(())
}

fn is_cancelled(options: &AnalyzeOptions) -> bool {
    options
        .cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Per-request decode cache keyed by `(origin, entry path)`. Shared across
/// rayon workers, dropped wholesale when the run ends.
#[derive(Default)]
struct DecodeCache {
    map: Mutex<HashMap<(String, String), Arc<ClassView>>>,
}

impl DecodeCache {
    fn get_or_decode(&self, entry: &ClassEntry) -> Option<Arc<ClassView>> {
        let key = (entry.origin.label(), entry.path.clone());
        if let Some(view) = self.lock().get(&key) {
            return Some(Arc::clone(view));
        }

        match classfile::decode(&entry.bytes) {
            Ok(view) => {
                let view = Arc::new(view);
                self.lock().insert(key, Arc::clone(&view));
                Some(view)
            }
            Err(error) => {
                warn!(
                    origin = %entry.origin.label(),
                    entry = %entry.path,
                    %error,
                    "skipping undecodable class entry"
                );
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Arc<ClassView>>> {
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Emits every endpoint a controller class declares, in method order, class
/// paths outer, method paths inner, verbs innermost.
fn endpoints_of_class(view: &ClassView) -> Vec<ApiEndpoint> {
    let class_mapping = ClassMapping::from_class(view);
    let mut endpoints = Vec::new();

    for method in &view.methods {
        if !mapping::is_handler_method(method) {
            continue;
        }

        let method_mapping = MethodMapping::from_method(method);
        let composed = mapping::compose(&class_mapping, &method_mapping);
        let tx = TransactionFacts::of(method);
        let validation = validation::collect(method);
        let annotations: Vec<String> = method.annotations.iter().map(|a| a.render()).collect();
        let parameter_types = method.descriptor.param_names();
        let return_type = method.descriptor.ret.to_string();

        for (url, verb) in &composed.pairs {
            let assessment = mutation::classify(verb, method, tx);
            let fired: Vec<&str> = assessment.fired.iter().map(|s| s.name()).collect();
            debug!(
                class = %view.name,
                method = %method.name,
                %url,
                %verb,
                alters_state = assessment.alters_state,
                confidence = assessment.confidence,
                signals = fired.join(","),
                "endpoint classified"
            );

            endpoints.push(ApiEndpoint {
                api_url: url.clone(),
                http_method: verb.clone(),
                controller_class: view.name.clone(),
                controller_method: method.name.clone(),
                alters_state: assessment.alters_state,
                validation: validation.clone(),
                method_details: MethodDetails {
                    return_type: return_type.clone(),
                    parameter_types: parameter_types.clone(),
                    annotations: annotations.clone(),
                    transaction_attributes: TransactionAttributes {
                        is_transactional: tx.transactional,
                        read_only: tx.read_only,
                    },
                    produces: composed.produces.clone(),
                    consumes: composed.consumes.clone(),
                },
            });
        }
    }

    endpoints
}
