//! Container label schema.
//!
//! Every container Skiff creates carries ownership labels; the reconcilers
//! treat these labels as the sole source of truth for which containers
//! belong to which workload. The schema is fixed:
//!
//! - `managed-by=skiff` on every managed container
//! - `pod=<pod-name>` — the logical pod name
//! - `container=<container-name>` — the container's name within the pod
//! - `deployment=<name>` or `statefulset=<name>` — the owning workload

use crate::manifest::Labels;

/// Label key marking a container as Skiff-managed.
pub const MANAGED_BY: &str = "managed-by";

/// Value of the `managed-by` label.
pub const MANAGED_BY_VALUE: &str = "skiff";

/// Label key carrying the logical pod name.
pub const POD: &str = "pod";

/// Label key carrying the container name within its pod.
pub const CONTAINER: &str = "container";

/// Owner label key for Deployment-owned containers.
pub const DEPLOYMENT: &str = "deployment";

/// Owner label key for StatefulSet-owned containers.
pub const STATEFULSET: &str = "statefulset";

/// True when `labels` is a superset of `selector`: every key/value pair in
/// the selector must match exactly. An empty selector matches everything.
pub fn selector_matches(labels: &Labels, selector: &Labels) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|found| found == v))
}

/// Parse the ordinal out of a pod name of the form `<owner>-<ordinal>`.
pub fn pod_ordinal(pod_name: &str, owner: &str) -> Option<usize> {
    pod_name
        .strip_prefix(owner)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn selector_matches_exact_subset() {
        let container = labels(&[("app", "x"), ("tier", "web"), ("pod", "x-0")]);
        assert!(selector_matches(&container, &labels(&[("app", "x")])));
        assert!(selector_matches(
            &container,
            &labels(&[("app", "x"), ("tier", "web")])
        ));
    }

    #[test]
    fn selector_rejects_wrong_value() {
        let container = labels(&[("app", "x")]);
        assert!(!selector_matches(&container, &labels(&[("app", "y")])));
    }

    #[test]
    fn selector_rejects_missing_key() {
        let container = labels(&[("app", "x")]);
        assert!(!selector_matches(&container, &labels(&[("tier", "web")])));
    }

    #[test]
    fn empty_selector_matches_anything() {
        assert!(selector_matches(&labels(&[("app", "x")]), &Labels::new()));
        assert!(selector_matches(&Labels::new(), &Labels::new()));
    }

    #[test]
    fn pod_ordinal_parsing() {
        assert_eq!(pod_ordinal("web-0", "web"), Some(0));
        assert_eq!(pod_ordinal("web-12", "web"), Some(12));
        // Hyphenated owner names keep their own hyphens.
        assert_eq!(pod_ordinal("api-server-3", "api-server"), Some(3));
        assert_eq!(pod_ordinal("web", "web"), None);
        assert_eq!(pod_ordinal("web-x", "web"), None);
        assert_eq!(pod_ordinal("other-0", "web"), None);
    }
}
