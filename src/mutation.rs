//! State-alteration heuristics.
//!
//! Six orthogonal signals, combined by short-circuit OR: HTTP verb, method
//! name, transactional annotation, persistence-layer calls, repository
//! calls, service calls. Each signal also carries a weight; the weighted
//! sum (capped at 1.0) is exposed as a confidence score next to the
//! boolean verdict.

use crate::classfile::MethodView;

const STATE_ALTERING_VERBS: [&str; 4] = ["POST", "PUT", "DELETE", "PATCH"];

const MUTATING_NAME_TOKENS: [&str; 22] = [
    "create", "save", "update", "modify", "edit", "delete", "remove", "insert", "add", "set",
    "put", "post", "patch", "persist", "merge", "store", "write", "commit", "submit", "process",
    "execute", "apply",
];

const PERSISTENCE_CALL_TOKENS: [&str; 16] = [
    "save",
    "saveall",
    "saveandflush",
    "delete",
    "deleteall",
    "deletebyid",
    "persist",
    "merge",
    "remove",
    "update",
    "flush",
    "clear",
    "refresh",
    "createquery",
    "createnativequery",
    "createnamedquery",
];

const REPOSITORY_CALL_TOKENS: [&str; 8] =
    ["save", "update", "delete", "remove", "create", "insert", "modify", "edit"];

const DERIVED_QUERY_PREFIXES: [&str; 5] =
    ["deleteallby", "removeby", "deleteby", "updateby", "saveby"];

const SERVICE_CALL_TOKENS: [&str; 7] =
    ["process", "handle", "execute", "perform", "apply", "commit", "submit"];

const BUSINESS_OPERATION_TOKENS: [&str; 26] = [
    "approve",
    "reject",
    "cancel",
    "activate",
    "deactivate",
    "enable",
    "disable",
    "publish",
    "unpublish",
    "archive",
    "restore",
    "validate",
    "confirm",
    "complete",
    "finalize",
    "authorize",
    "authenticate",
    "register",
    "enroll",
    "subscribe",
    "unsubscribe",
    "transfer",
    "import",
    "export",
    "sync",
    "migrate",
];

/// Signal names are tagged so diagnostics can name what fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Verb,
    Name,
    Transaction,
    PersistenceCall,
    RepositoryCall,
    ServiceCall,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Verb => "verb",
            Signal::Name => "name",
            Signal::Transaction => "transaction",
            Signal::PersistenceCall => "persistence-call",
            Signal::RepositoryCall => "repository-call",
            Signal::ServiceCall => "service-call",
        }
    }

    fn weight(self) -> f64 {
        match self {
            Signal::Verb => 0.30,
            Signal::Name => 0.20,
            Signal::Transaction => 0.25,
            Signal::PersistenceCall => 0.20,
            Signal::RepositoryCall => 0.15,
            Signal::ServiceCall => 0.10,
        }
    }
}

const ALL_SIGNALS: [Signal; 6] = [
    Signal::Verb,
    Signal::Name,
    Signal::Transaction,
    Signal::PersistenceCall,
    Signal::RepositoryCall,
    Signal::ServiceCall,
];

/// Transactional annotation facts, extracted once per method.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFacts {
    pub transactional: bool,
    pub read_only: bool,
}

impl TransactionFacts {
    pub fn of(method: &MethodView) -> Self {
        let mut facts = Self::default();
        for annotation in &method.annotations {
            if annotation.descriptor.contains("Transactional") {
                facts.transactional = true;
                if annotation
                    .get("readOnly")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
                {
                    facts.read_only = true;
                }
            }
        }
        facts
    }
}

#[derive(Debug, Clone)]
pub struct MutationAssessment {
    pub alters_state: bool,
    pub confidence: f64,
    pub fired: Vec<Signal>,
}

/// Classifies one emitted endpoint. The verb signal is evaluated against
/// the endpoint's own verb; the remaining five are method-wide, so a
/// generic mapping with `method = {GET, POST}` splits into a read-only GET
/// endpoint and a mutating POST one.
pub fn classify(verb: &str, method: &MethodView, tx: TransactionFacts) -> MutationAssessment {
    let calls: Vec<String> = method.calls.iter().map(|c| c.qualified_lower()).collect();
    let method_name = method.name.to_lowercase();

    let fired: Vec<Signal> = ALL_SIGNALS
        .into_iter()
        .filter(|signal| match signal {
            Signal::Verb => STATE_ALTERING_VERBS.contains(&verb),
            Signal::Name => MUTATING_NAME_TOKENS.iter().any(|t| method_name.contains(t)),
            Signal::Transaction => tx.transactional && !tx.read_only,
            Signal::PersistenceCall => calls
                .iter()
                .any(|call| PERSISTENCE_CALL_TOKENS.iter().any(|t| call.contains(t))),
            Signal::RepositoryCall => calls.iter().any(|call| is_repository_mutation(call)),
            Signal::ServiceCall => calls.iter().any(|call| is_service_mutation(call)),
        })
        .collect();

    let confidence = fired
        .iter()
        .map(|s| s.weight())
        .sum::<f64>()
        .min(1.0);

    MutationAssessment {
        alters_state: !fired.is_empty(),
        confidence,
        fired,
    }
}

fn is_repository_mutation(call: &str) -> bool {
    if !call.contains("repository") && !call.contains("dao") {
        return false;
    }
    REPOSITORY_CALL_TOKENS.iter().any(|t| call.contains(t))
        || DERIVED_QUERY_PREFIXES.iter().any(|t| call.contains(t))
}

fn is_service_mutation(call: &str) -> bool {
    if !call.contains("service") {
        return false;
    }
    SERVICE_CALL_TOKENS.iter().any(|t| call.contains(t))
        || BUSINESS_OPERATION_TOKENS.iter().any(|t| call.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationValue, AnnotationView};
    use crate::classfile::CallTarget;
    use crate::descriptor::MethodDescriptor;

    fn method(name: &str) -> MethodView {
        MethodView {
            name: name.to_string(),
            descriptor: MethodDescriptor::parse("()V").unwrap(),
            annotations: vec![],
            parameter_annotations: vec![],
            calls: vec![],
        }
    }

    fn call(owner: &str, name: &str) -> CallTarget {
        CallTarget {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: "()V".to_string(),
        }
    }

    fn transactional(read_only: Option<bool>) -> AnnotationView {
        AnnotationView {
            descriptor: "Lorg/springframework/transaction/annotation/Transactional;".to_string(),
            pairs: read_only
                .map(|v| vec![("readOnly".to_string(), AnnotationValue::Bool(v))])
                .unwrap_or_default(),
        }
    }

    #[test]
    fn post_verb_alone_alters_state() {
        let a = classify("POST", &method("batch"), TransactionFacts::default());
        assert!(a.alters_state);
        assert_eq!(a.fired, vec![Signal::Verb]);
        assert!((a.confidence - 0.30).abs() < 1e-9);
    }

    #[test]
    fn get_by_id_without_signals_is_read_only() {
        let mut m = method("getById");
        m.calls.push(call("com.ex.UserRepository", "findById"));
        let a = classify("GET", &m, TransactionFacts::default());
        assert!(!a.alters_state);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn mutating_name_token_fires() {
        let a = classify("GET", &method("createUser"), TransactionFacts::default());
        assert!(a.alters_state);
        assert_eq!(a.fired, vec![Signal::Name]);
    }

    #[test]
    fn read_only_transaction_does_not_fire() {
        let mut m = method("fetchReport");
        m.annotations.push(transactional(Some(true)));
        let tx = TransactionFacts::of(&m);
        assert!(tx.transactional && tx.read_only);
        let a = classify("GET", &m, tx);
        assert!(!a.alters_state);
    }

    #[test]
    fn plain_transaction_fires() {
        let mut m = method("reconcile");
        m.annotations.push(transactional(None));
        let tx = TransactionFacts::of(&m);
        let a = classify("GET", &m, tx);
        assert!(a.alters_state);
        assert_eq!(a.fired, vec![Signal::Transaction]);
    }

    #[test]
    fn persistence_call_fires() {
        let mut m = method("handleImportantThing");
        m.calls.push(call("jakarta.persistence.EntityManager", "persist"));
        let a = classify("GET", &m, TransactionFacts::default());
        assert!(a.fired.contains(&Signal::PersistenceCall));
    }

    #[test]
    fn repository_call_needs_repository_owner() {
        let mut m = method("lookup");
        m.calls.push(call("com.ex.AuditHelper", "insertMarker"));
        let a = classify("GET", &m, TransactionFacts::default());
        assert!(!a.fired.contains(&Signal::RepositoryCall));

        let mut m = method("lookup");
        m.calls.push(call("com.ex.UserRepository", "deleteAllByAge"));
        let a = classify("GET", &m, TransactionFacts::default());
        assert!(a.fired.contains(&Signal::RepositoryCall));
    }

    #[test]
    fn service_business_operation_fires() {
        let mut m = method("review");
        m.calls.push(call("com.ex.OrderService", "approveOrder"));
        let a = classify("GET", &m, TransactionFacts::default());
        assert!(a.fired.contains(&Signal::ServiceCall));
        assert!((a.confidence - 0.10).abs() < 1e-9);
    }

    #[test]
    fn confidence_caps_at_one() {
        let mut m = method("createAndSaveEverything");
        m.annotations.push(transactional(None));
        m.calls.push(call("com.ex.UserRepository", "saveAndFlush"));
        m.calls.push(call("com.ex.UserService", "processSignup"));
        let tx = TransactionFacts::of(&m);
        let a = classify("POST", &m, tx);
        assert!(a.alters_state);
        assert_eq!(a.fired.len(), 6);
        assert!((a.confidence - 1.0).abs() < 1e-9);
    }
}
