//! Function bin packing
//!
//! Groups routes into deployable functions under a size ceiling. The
//! heuristic is first-fit-decreasing with a single open bin; it ignores how
//! much code routes share, which keeps it predictable.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::manifest::ApiKind;
use crate::route::function_name_for_page;

/// Function size above which the platform starts warning, in bytes
pub const LAMBDA_WARNING_SIZE: u64 = 200 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedItem<T> {
    pub value: T,
    /// Estimated artifact size in bytes
    pub weight: u64,
}

impl<T> WeightedItem<T> {
    pub fn new(value: T, weight: u64) -> Self {
        Self { value, weight }
    }
}

/// Packs items into bins whose summed weight stays within `threshold`
///
/// Items are taken heaviest first (ties keep input order). An item heavier
/// than `threshold` always ends up alone.
///
/// # Examples
///
/// ```
/// use nxpack_router::pack::{pack, WeightedItem};
///
/// let items = vec![
///     WeightedItem::new("A", 60),
///     WeightedItem::new("B", 50),
///     WeightedItem::new("C", 10),
/// ];
/// assert_eq!(pack(items, 100), vec![vec!["A"], vec!["B", "C"]]);
/// ```
pub fn pack<T>(mut items: Vec<WeightedItem<T>>, threshold: u64) -> Vec<Vec<T>> {
    items.sort_by(|a, b| b.weight.cmp(&a.weight));

    let mut bins = Vec::new();
    let mut open: Vec<T> = Vec::new();
    let mut total = 0u64;

    for item in items {
        let fits = total
            .checked_add(item.weight)
            .is_some_and(|sum| sum <= threshold);
        if fits {
            total += item.weight;
            open.push(item.value);
        } else {
            if !open.is_empty() {
                bins.push(std::mem::take(&mut open));
            }
            total = item.weight;
            open.push(item.value);
        }
    }

    if !open.is_empty() {
        bins.push(open);
    }
    bins
}

/// Packing threshold once the code every function ships is accounted for
pub fn default_threshold(common_dependency_size: u64) -> u64 {
    LAMBDA_WARNING_SIZE.saturating_sub(common_dependency_size)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoute {
    pub route: String,
    pub kind: ApiKind,
    /// Size of the route's own files, in bytes
    pub weight: u64,
}

/// One deployable function serving one or more API routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiLambda {
    pub function_name: String,
    pub kind: ApiKind,
    pub routes: Vec<String>,
}

impl ApiLambda {
    pub fn target(&self) -> String {
        format!("/.netlify/functions/{}", self.function_name)
    }

    /// Route → rewrite target map for every invokable route of `lambdas`
    pub fn targets(lambdas: &[ApiLambda]) -> HashMap<String, String> {
        lambdas
            .iter()
            .filter(|lambda| lambda.kind != ApiKind::Scheduled)
            .flat_map(|lambda| {
                let target = lambda.target();
                lambda
                    .routes
                    .iter()
                    .map(move |route| (route.clone(), target.clone()))
            })
            .collect()
    }
}

fn shared_name(kind: ApiKind, index: usize, shared_bins: usize) -> String {
    let base = if shared_bins > 1 {
        format!("api-handler-{}", index + 1)
    } else {
        "api-handler".to_string()
    };
    match kind {
        ApiKind::Background => format!("{}-background", base),
        _ => base,
    }
}

fn lambdas_for_kind(routes: Vec<ApiRoute>, kind: ApiKind, threshold: u64) -> Vec<ApiLambda> {
    let bins = pack(
        routes
            .into_iter()
            .map(|r| WeightedItem::new(r.route, r.weight))
            .collect(),
        threshold,
    );
    let shared_bins = bins.iter().filter(|b| b.len() > 1).count();

    let mut shared_index = 0;
    bins.into_iter()
        .map(|routes| {
            let function_name = match routes.as_slice() {
                [single] => function_name_for_page(single, kind == ApiKind::Background),
                _ => {
                    let name = shared_name(kind, shared_index, shared_bins);
                    shared_index += 1;
                    name
                }
            };
            ApiLambda {
                function_name,
                kind,
                routes,
            }
        })
        .collect()
}

/// Groups API routes into functions
///
/// Standard and background routes are packed separately, since a function
/// is either one or the other. Scheduled routes each get their own
/// function.
pub fn api_lambdas(routes: Vec<ApiRoute>, threshold: u64) -> Vec<ApiLambda> {
    for oversized in routes.iter().filter(|r| r.weight > threshold) {
        warn!(
            route = %oversized.route,
            weight = oversized.weight,
            threshold,
            "API route exceeds the function size threshold on its own"
        );
    }

    let (scheduled, packable): (Vec<_>, Vec<_>) = routes
        .into_iter()
        .partition(|r| r.kind == ApiKind::Scheduled);
    let (background, standard): (Vec<_>, Vec<_>) = packable
        .into_iter()
        .partition(|r| r.kind == ApiKind::Background);

    let mut lambdas = lambdas_for_kind(standard, ApiKind::Standard, threshold);
    lambdas.extend(lambdas_for_kind(background, ApiKind::Background, threshold));
    lambdas.extend(scheduled.into_iter().map(|r| ApiLambda {
        function_name: function_name_for_page(&r.route, false),
        kind: ApiKind::Scheduled,
        routes: vec![r.route],
    }));

    debug!(functions = lambdas.len(), "grouped API routes");
    lambdas
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn route(route: &str, kind: ApiKind, weight: u64) -> ApiRoute {
        ApiRoute {
            route: route.to_string(),
            kind,
            weight,
        }
    }

    #[test]
    fn test_pack_empty() {
        assert_eq!(pack(Vec::<WeightedItem<u8>>::new(), 100), Vec::<Vec<u8>>::new());
    }

    #[rstest]
    #[case(vec![("big", 150), ("a", 10), ("b", 20)], 100)]
    #[case(vec![("a", 10), ("huge", 1000), ("b", 95), ("c", 5)], 100)]
    #[case(vec![("a", 100), ("b", 100), ("c", 0)], 100)]
    fn test_pack_invariants(#[case] input: Vec<(&str, u64)>, #[case] threshold: u64) {
        let items: Vec<_> = input.iter().map(|(v, w)| WeightedItem::new(*v, *w)).collect();
        let bins = pack(items, threshold);

        let weight_of = |v: &str| input.iter().find(|(name, _)| *name == v).map(|(_, w)| *w);
        for bin in &bins {
            assert!(!bin.is_empty());
            if bin.iter().any(|v| weight_of(*v) > Some(threshold)) {
                assert_eq!(bin.len(), 1);
            } else {
                let sum: u64 = bin.iter().filter_map(|v| weight_of(*v)).sum();
                assert!(sum <= threshold);
            }
        }

        let mut flattened: Vec<&str> = bins.into_iter().flatten().collect();
        let mut expected: Vec<&str> = input.iter().map(|(v, _)| *v).collect();
        flattened.sort_unstable();
        expected.sort_unstable();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn test_pack_ties_keep_input_order() {
        let items = vec![
            WeightedItem::new("x", 30),
            WeightedItem::new("y", 30),
            WeightedItem::new("z", 30),
        ];
        assert_eq!(pack(items, 60), vec![vec!["x", "y"], vec!["z"]]);
    }

    #[test]
    fn test_api_lambdas_naming() {
        let lambdas = api_lambdas(
            vec![
                route("/api/big/[id]", ApiKind::Standard, 90),
                route("/api/a", ApiKind::Standard, 30),
                route("/api/b", ApiKind::Standard, 30),
                route("/api/job", ApiKind::Background, 10),
                route("/api/cron", ApiKind::Scheduled, 10),
            ],
            100,
        );
        let names: Vec<(&str, Vec<&str>)> = lambdas
            .iter()
            .map(|l| {
                (
                    l.function_name.as_str(),
                    l.routes.iter().map(String::as_str).collect(),
                )
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("api_big_id-PARAM-handler", vec!["/api/big/[id]"]),
                ("api-handler", vec!["/api/a", "/api/b"]),
                ("api_job-background", vec!["/api/job"]),
                ("api_cron-handler", vec!["/api/cron"]),
            ]
        );
    }

    #[test]
    fn test_several_shared_bins_are_numbered() {
        let lambdas = api_lambdas(
            (0..4)
                .map(|i| route(&format!("/api/r{}", i), ApiKind::Background, 50))
                .collect(),
            100,
        );
        let names: Vec<&str> = lambdas.iter().map(|l| l.function_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["api-handler-1-background", "api-handler-2-background"]
        );
    }

    #[test]
    fn test_targets_skip_scheduled() {
        let lambdas = api_lambdas(
            vec![
                route("/api/a", ApiKind::Standard, 10),
                route("/api/cron", ApiKind::Scheduled, 10),
            ],
            100,
        );
        let targets = ApiLambda::targets(&lambdas);
        assert_eq!(targets.len(), 1);
        assert_eq!(
            targets.get("/api/a").map(String::as_str),
            Some("/.netlify/functions/api_a-handler")
        );
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(default_threshold(0), LAMBDA_WARNING_SIZE);
        assert_eq!(default_threshold(u64::MAX), 0);
    }
}
