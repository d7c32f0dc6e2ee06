//! Validation constraint collection.
//!
//! Builds the human-readable validation descriptor list for a handler
//! method from three sources: method-level annotations, per-parameter
//! annotations, and validation-shaped call targets. Descriptors are
//! deduplicated and sorted lexicographically.

use crate::classfile::MethodView;
use crate::descriptor::simple_class_name;

const BEAN_VALIDATION_ANNOTATIONS: [&str; 23] = [
    "Valid",
    "Validated",
    "NotNull",
    "NotEmpty",
    "NotBlank",
    "Size",
    "Min",
    "Max",
    "Pattern",
    "Email",
    "Positive",
    "Negative",
    "PositiveOrZero",
    "NegativeOrZero",
    "DecimalMin",
    "DecimalMax",
    "Digits",
    "Future",
    "Past",
    "FutureOrPresent",
    "PastOrPresent",
    "AssertTrue",
    "AssertFalse",
];

const BINDING_ANNOTATIONS: [&str; 3] = ["RequestBody", "ModelAttribute", "RequestPart"];

const PARAMETER_BINDING_ANNOTATIONS: [&str; 4] =
    ["PathVariable", "RequestParam", "RequestHeader", "CookieValue"];

/// Collects, dedups and sorts all validation descriptors for one method.
pub fn collect(method: &MethodView) -> Vec<String> {
    let mut rules = Vec::new();
    collect_method_level(method, &mut rules);
    collect_parameter_level(method, &mut rules);
    collect_call_hints(method, &mut rules);

    rules.sort();
    rules.dedup();
    rules
}

fn collect_method_level(method: &MethodView, rules: &mut Vec<String>) {
    for annotation in &method.annotations {
        let simple = annotation.simple_name();

        if simple == "Validated" {
            rules.push("@Validated annotation on method - enables validation groups".to_string());
        } else if simple == "Valid" {
            rules.push("@Valid annotation on method - enables bean validation".to_string());
        } else if is_custom_validation(&annotation.descriptor) {
            rules.push(format!("Custom validation annotation: {simple}"));
        }
    }
}

fn collect_parameter_level(method: &MethodView, rules: &mut Vec<String>) {
    let param_types = method.descriptor.param_names();

    for (index, annotations) in method.parameter_annotations.iter().enumerate() {
        let param_name = format!("param{index}");
        let param_type = param_types
            .get(index)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let mut validated = false;

        for annotation in annotations {
            let simple = annotation.simple_name();

            if BEAN_VALIDATION_ANNOTATIONS.contains(&simple.as_str()) {
                validated = true;
                rules.push(format!(
                    "@{simple} on parameter '{param_name}' (type: {param_type})"
                ));
            }
            if BINDING_ANNOTATIONS.contains(&simple.as_str()) {
                rules.push(format!(
                    "@{simple} on parameter '{param_name}' - enables request body validation"
                ));
            }
            if PARAMETER_BINDING_ANNOTATIONS.contains(&simple.as_str()) {
                rules.push(format!(
                    "@{simple} on parameter '{param_name}' - parameter binding with potential validation"
                ));
            }
        }

        if validated {
            rules.push(format!(
                "Parameter '{param_name}' (type: {param_type}) has validation annotations"
            ));
        }
    }

    // Type-shape hints hold for every declared parameter, annotated or not.
    for param_type in &param_types {
        if let Some(hint) = type_hint(param_type) {
            rules.push(hint);
        }
    }
}

/// Heuristic hints from the parameter's type name alone.
fn type_hint(param_type: &str) -> Option<String> {
    let lower = param_type.to_lowercase();
    if lower.contains("request") || lower.contains("dto") || lower.contains("form") {
        return Some(format!(
            "Parameter type '{param_type}' likely contains validation annotations"
        ));
    }
    if lower.contains("entity") || lower.contains("model") {
        return Some(format!(
            "Entity/Model parameter '{param_type}' may have JPA validation constraints"
        ));
    }
    if lower.contains("list") || lower.contains("set") || lower.contains("collection") {
        return Some(format!(
            "Collection parameter '{param_type}' may contain validated objects"
        ));
    }
    None
}

fn collect_call_hints(method: &MethodView, rules: &mut Vec<String>) {
    for target in &method.calls {
        let qualified = format!("{}.{}", target.owner, target.name);
        let lower = qualified.to_lowercase();

        if lower.contains("validate") {
            rules.push(format!("Service layer validation: {qualified}"));
        }
        if lower.contains("check") {
            rules.push(format!("Service layer check: {qualified}"));
        }
        if lower.contains("verify") {
            rules.push(format!("Service layer verification: {qualified}"));
        }
        if lower.contains("assert") {
            rules.push(format!("Service layer assertion: {qualified}"));
        }
        if lower.contains("validator") {
            rules.push(format!("Spring Validator usage: {qualified}"));
        }
        if lower.contains("constraintviolation") || lower.contains("validationfactory") {
            rules.push(format!("Bean Validation API usage: {qualified}"));
        }
    }
}

fn is_custom_validation(descriptor: &str) -> bool {
    let lower = descriptor.to_lowercase();
    let simple = simple_class_name(descriptor);
    if simple == "Valid" || simple == "Validated" {
        return false;
    }
    lower.contains("validation") || lower.contains("constraint") || lower.contains("validator")
}
