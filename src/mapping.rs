//! Controller discovery and request-mapping composition.
//!
//! A class is handler-bearing when it carries one of the controller marker
//! annotations; a method is a handler when it carries a mapping annotation.
//! Class-level and method-level mappings compose into concrete
//! `(url pattern, verb)` pairs: Cartesian product over paths, verb
//! precedence method > class > annotation-variant default > `GET`.

use crate::annotation::AnnotationView;
use crate::classfile::{ClassView, MethodView};

pub const CONTROLLER_ANNOTATIONS: [&str; 3] = [
    "Lorg/springframework/stereotype/Controller;",
    "Lorg/springframework/web/bind/annotation/RestController;",
    "Lorg/springframework/web/bind/annotation/ControllerAdvice;",
];

pub const REQUEST_MAPPING: &str = "Lorg/springframework/web/bind/annotation/RequestMapping;";

const VERB_MAPPINGS: [(&str, &str); 5] = [
    ("Lorg/springframework/web/bind/annotation/GetMapping;", "GET"),
    ("Lorg/springframework/web/bind/annotation/PostMapping;", "POST"),
    ("Lorg/springframework/web/bind/annotation/PutMapping;", "PUT"),
    ("Lorg/springframework/web/bind/annotation/DeleteMapping;", "DELETE"),
    ("Lorg/springframework/web/bind/annotation/PatchMapping;", "PATCH"),
];

pub const CANONICAL_VERBS: [&str; 7] =
    ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"];

pub fn is_controller(class: &ClassView) -> bool {
    class
        .annotations
        .iter()
        .any(|a| CONTROLLER_ANNOTATIONS.contains(&a.descriptor.as_str()))
}

pub fn is_mapping_annotation(descriptor: &str) -> bool {
    descriptor == REQUEST_MAPPING || verb_for_descriptor(descriptor).is_some()
}

pub fn is_handler_method(method: &MethodView) -> bool {
    method
        .annotations
        .iter()
        .any(|a| is_mapping_annotation(&a.descriptor))
}

/// The implied verb of a verb-specific mapping variant.
pub fn verb_for_descriptor(descriptor: &str) -> Option<&'static str> {
    VERB_MAPPINGS
        .iter()
        .find(|(d, _)| *d == descriptor)
        .map(|(_, verb)| *verb)
}

/// Class-level mapping: base paths, verbs, produces, consumes. All sets may
/// be empty. Base paths are normalized to start with a slash.
#[derive(Debug, Clone, Default)]
pub struct ClassMapping {
    pub base_paths: Vec<String>,
    pub verbs: Vec<String>,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
}

impl ClassMapping {
    pub fn from_class(class: &ClassView) -> Self {
        let mut mapping = Self::default();
        for annotation in &class.annotations {
            if annotation.descriptor == REQUEST_MAPPING {
                mapping.base_paths = paths_of(annotation)
                    .into_iter()
                    .map(|p| normalize_leading_slash(&p))
                    .collect();
                mapping.verbs = verbs_of(annotation);
                mapping.produces = attr_strings(annotation, "produces");
                mapping.consumes = attr_strings(annotation, "consumes");
            }
        }
        mapping
    }
}

/// Method-level mapping from the generic annotation or a verb variant.
#[derive(Debug, Clone, Default)]
pub struct MethodMapping {
    pub paths: Vec<String>,
    pub verbs: Vec<String>,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
}

impl MethodMapping {
    pub fn from_method(method: &MethodView) -> Self {
        let mut mapping = Self::default();
        for annotation in &method.annotations {
            if !is_mapping_annotation(&annotation.descriptor) {
                continue;
            }
            mapping.paths.extend(paths_of(annotation));
            mapping.verbs.extend(verbs_of(annotation));
            if mapping.verbs.is_empty()
                && let Some(verb) = verb_for_descriptor(&annotation.descriptor)
            {
                mapping.verbs.push(verb.to_string());
            }
            if mapping.produces.is_empty() {
                mapping.produces = attr_strings(annotation, "produces");
            }
            if mapping.consumes.is_empty() {
                mapping.consumes = attr_strings(annotation, "consumes");
            }
        }
        mapping
    }
}

/// Composed `(url pattern, verb)` pairs plus the effective produces and
/// consumes sets for one handler method.
#[derive(Debug, Clone)]
pub struct ComposedMapping {
    pub pairs: Vec<(String, String)>,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
}

/// Composition order: class paths outer, method paths inner, verbs
/// innermost. Duplicate `(path, verb)` pairs collapse, first win.
pub fn compose(class: &ClassMapping, method: &MethodMapping) -> ComposedMapping {
    let paths = combine_paths(&class.base_paths, &method.paths);

    let verbs: Vec<String> = if !method.verbs.is_empty() {
        method.verbs.clone()
    } else if !class.verbs.is_empty() {
        class.verbs.clone()
    } else {
        // Generic annotation with no verb anywhere: documented GET fallback.
        vec!["GET".to_string()]
    };

    let mut pairs = Vec::new();
    for path in &paths {
        for verb in &verbs {
            let pair = (path.clone(), verb.clone());
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
    }

    ComposedMapping {
        pairs,
        produces: if method.produces.is_empty() {
            class.produces.clone()
        } else {
            method.produces.clone()
        },
        consumes: if method.consumes.is_empty() {
            class.consumes.clone()
        } else {
            method.consumes.clone()
        },
    }
}

fn combine_paths(base_paths: &[String], method_paths: &[String]) -> Vec<String> {
    if base_paths.is_empty() && method_paths.is_empty() {
        return vec![String::new()];
    }
    if base_paths.is_empty() {
        return method_paths.to_vec();
    }
    if method_paths.is_empty() {
        return base_paths.to_vec();
    }

    let mut combined = Vec::with_capacity(base_paths.len() * method_paths.len());
    for base in base_paths {
        for leaf in method_paths {
            combined.push(join_path(base, leaf));
        }
    }
    combined
}

/// Joins two path segments with exactly one separating slash.
pub fn join_path(base: &str, leaf: &str) -> String {
    if base.is_empty() {
        return leaf.to_string();
    }
    if leaf.is_empty() {
        return base.to_string();
    }
    let base = base.trim_end_matches('/');
    if leaf.starts_with('/') {
        format!("{base}{leaf}")
    } else {
        format!("{base}/{leaf}")
    }
}

fn normalize_leading_slash(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// `value` with `path` as the fallback attribute name.
fn paths_of(annotation: &AnnotationView) -> Vec<String> {
    let value = annotation
        .get("value")
        .or_else(|| annotation.get("path"));
    value.map(|v| v.string_list()).unwrap_or_default()
}

/// RequestMethod enum constants from the `method` attribute, restricted to
/// the seven canonical verbs.
fn verbs_of(annotation: &AnnotationView) -> Vec<String> {
    annotation
        .get("method")
        .map(|v| v.enum_constants())
        .unwrap_or_default()
        .into_iter()
        .filter(|verb| CANONICAL_VERBS.contains(&verb.as_str()))
        .collect()
}

fn attr_strings(annotation: &AnnotationView, name: &str) -> Vec<String> {
    annotation
        .get(name)
        .map(|v| v.string_list())
        .unwrap_or_default()
}
