//! Property tests for the admission algorithm.
//!
//! Schemes here are scripted: each one either succeeds with a fixed role set
//! or fails with a credential error, regardless of the request. That lets
//! the properties range over every combination of mode, scheme outcomes,
//! and role requirements.

use std::sync::Arc;

use http::request::Parts;
use http::Request;
use proptest::prelude::*;

use turnstile_core::{
    async_trait, AuthMode, ConfigError, Credentials, Evaluator, Identity, Outcome, RoutePolicy,
    Scheme, SchemeError, SchemeRegistry,
};

#[derive(Debug)]
struct Scripted {
    index: usize,
    roles: Vec<String>,
}

impl Identity for Scripted {
    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

struct Script {
    index: usize,
    succeeds: bool,
    roles: Vec<String>,
}

#[async_trait]
impl Scheme for Script {
    async fn verify(&self, _request: &Parts) -> Result<Arc<dyn Identity>, SchemeError> {
        if self.succeeds {
            Ok(Arc::new(Scripted {
                index: self.index,
                roles: self.roles.clone(),
            }))
        } else {
            Err(SchemeError::Invalid(format!("scheme {} refuses", self.index)))
        }
    }
}

const ROLES: [&str; 3] = ["user", "admin", "auditor"];

fn role_set() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(ROLES.to_vec(), 0..=ROLES.len())
        .prop_map(|roles| roles.into_iter().map(String::from).collect())
}

fn mode() -> impl Strategy<Value = AuthMode> {
    prop_oneof![Just(AuthMode::None), Just(AuthMode::Optional), Just(AuthMode::Required)]
}

fn build(outcomes: &[(bool, Vec<String>)]) -> (SchemeRegistry, Vec<String>) {
    let mut registry = SchemeRegistry::new();
    let mut names = Vec::new();
    for (index, (succeeds, roles)) in outcomes.iter().enumerate() {
        let name = format!("s{index}");
        registry.register(
            name.clone(),
            Script {
                index,
                succeeds: *succeeds,
                roles: roles.clone(),
            },
        );
        names.push(name);
    }
    (registry, names)
}

fn request() -> Parts {
    Request::builder().uri("/").body(()).unwrap().into_parts().0
}

fn evaluate(eval: &Evaluator) -> Result<Option<Credentials>, turnstile_core::Rejection> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(eval.evaluate(&request()))
}

proptest! {
    #[test]
    fn none_mode_always_admits_anonymously(
        outcomes in proptest::collection::vec((any::<bool>(), role_set()), 0..4),
    ) {
        let (registry, names) = build(&outcomes);
        let eval = Evaluator::new(&registry, &RoutePolicy::none().schemes(names)).unwrap();
        let admitted = evaluate(&eval).unwrap();
        prop_assert!(admitted.is_none());
    }

    #[test]
    fn authenticated_modes_without_schemes_fail_setup(mode in mode()) {
        prop_assume!(mode != AuthMode::None);
        let registry = SchemeRegistry::new();
        prop_assert_eq!(
            Evaluator::new(&registry, &RoutePolicy::new(mode)).err(),
            Some(ConfigError::NoSchemes { mode })
        );
    }

    #[test]
    fn decision_matches_model(
        mode in mode(),
        outcomes in proptest::collection::vec((any::<bool>(), role_set()), 1..5),
        required in role_set(),
    ) {
        prop_assume!(mode != AuthMode::None || required.is_empty());
        let (registry, names) = build(&outcomes);
        let policy = RoutePolicy::new(mode).schemes(names).roles(required.clone());
        let eval = Evaluator::new(&registry, &policy).unwrap();
        let result = evaluate(&eval);

        let winner = outcomes.iter().position(|(ok, _)| *ok);
        let expected = match (mode, winner) {
            (AuthMode::None, _) => Outcome::Allowed,
            (AuthMode::Optional, None) => Outcome::Allowed,
            (AuthMode::Required, None) => Outcome::Unauthorized,
            (_, Some(i)) => {
                let held = &outcomes[i].1;
                if required.is_empty() || required.iter().any(|r| held.contains(r)) {
                    Outcome::Allowed
                } else {
                    Outcome::Forbidden
                }
            }
        };

        match &result {
            Ok(_) => prop_assert_eq!(expected, Outcome::Allowed),
            Err(rejection) => prop_assert_eq!(expected, rejection.outcome()),
        }

        if let (Ok(Some(creds)), Some(i)) = (&result, winner) {
            prop_assert_eq!(creds.downcast_ref::<Scripted>().unwrap().index, i);
            prop_assert_eq!(creds.scheme(), format!("s{i}"));
        }
        if mode == AuthMode::Optional && winner.is_none() {
            prop_assert!(matches!(result, Ok(None)));
        }
    }

    #[test]
    fn last_registration_wins(first_roles in role_set(), second_roles in role_set()) {
        let mut registry = SchemeRegistry::new();
        registry.register("jwt", Script { index: 1, succeeds: true, roles: first_roles });
        registry.register("jwt", Script { index: 2, succeeds: true, roles: second_roles });
        registry.set_default("jwt").unwrap();

        let eval = Evaluator::new(&registry, &RoutePolicy::required()).unwrap();
        let creds = evaluate(&eval).unwrap().unwrap();
        prop_assert_eq!(creds.downcast_ref::<Scripted>().unwrap().index, 2);
    }
}
