use k8s_openapi::api::networking::v1::Ingress;
use tracing::info;

use crate::config::annotations::{self, Annotations};

/// The whitelist of an ingress is only extended, never created: it is patched
/// if monitoring is enabled and the ingress already restricts its sources.
pub fn should_patch_source_range_whitelist(ingress: &Ingress) -> bool {
    let annotations = Annotations::new(ingress.metadata.annotations.as_ref());
    annotations.is_monitor_enabled() && !annotations.string(annotations::NGINX_WHITELIST_SOURCE_RANGE, "").is_empty()
}

/// The comma separated whitelist of an ingress, in declaration order.
pub fn source_range_whitelist(ingress: &Ingress) -> Vec<String> {
    Annotations::new(ingress.metadata.annotations.as_ref())
        .string(annotations::NGINX_WHITELIST_SOURCE_RANGE, "")
        .split(',')
        .map(str::to_owned)
        .collect()
}

pub fn set_source_range_whitelist(ingress: &mut Ingress, source_ranges: &[String]) {
    ingress
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(annotations::NGINX_WHITELIST_SOURCE_RANGE.to_owned(), source_ranges.join(","));
}

/// Appends the provider ranges missing from `source_ranges`. Existing entries
/// keep their order, the second value tells whether anything was added.
pub fn merge_source_ranges(mut source_ranges: Vec<String>, provider_source_ranges: &[String]) -> (Vec<String>, bool) {
    let missing: Vec<String> = difference(provider_source_ranges, &source_ranges).into_iter().cloned().collect();
    if missing.is_empty() {
        return (source_ranges, false);
    }

    info!(?missing, "missing source ranges");
    source_ranges.extend(missing);
    (source_ranges, true)
}

/// Elements of `a` that are not in `b`. Plain string comparison, CIDRs are not
/// normalized.
fn difference<'a>(a: &'a [String], b: &[String]) -> Vec<&'a String> {
    a.iter().filter(|el| !b.contains(el)).collect()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::networking::v1::Ingress;

    use super::{merge_source_ranges, set_source_range_whitelist, should_patch_source_range_whitelist, source_range_whitelist};

    fn ranges(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_owned()).collect()
    }

    fn ingress(yaml: &str) -> Ingress {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn appends_missing_ranges() {
        let (merged, updated) = merge_source_ranges(ranges(&["1.2.3.4/32"]), &ranges(&["5.6.7.8/32"]));
        assert!(updated);
        assert_eq!(merged, ranges(&["1.2.3.4/32", "5.6.7.8/32"]));
    }

    #[test]
    fn keeps_order_of_present_ranges() {
        let (merged, updated) = merge_source_ranges(ranges(&["1.2.3.4/32", "5.6.7.8/32"]), &ranges(&["5.6.7.8/32", "1.2.3.4/32"]));
        assert!(!updated);
        assert_eq!(merged, ranges(&["1.2.3.4/32", "5.6.7.8/32"]));
    }

    #[test]
    fn appends_in_provider_order() {
        let (merged, updated) =
            merge_source_ranges(ranges(&["10.0.0.0/8", "1.2.3.4/32"]), &ranges(&["9.9.9.9/32", "1.2.3.4/32", "5.6.7.8/32"]));
        assert!(updated);
        assert_eq!(merged, ranges(&["10.0.0.0/8", "1.2.3.4/32", "9.9.9.9/32", "5.6.7.8/32"]));
    }

    #[test]
    fn only_enabled_ingresses_with_whitelist_are_patched() {
        let enabled = r#"
metadata:
  annotations:
    ingress-monitor.bonial.com/enabled: "true"
    nginx.ingress.kubernetes.io/whitelist-source-range: 10.0.0.0/8
"#;
        assert!(should_patch_source_range_whitelist(&ingress(enabled)));

        let disabled = r#"
metadata:
  annotations:
    ingress-monitor.bonial.com/enabled: "false"
    nginx.ingress.kubernetes.io/whitelist-source-range: 10.0.0.0/8
"#;
        assert!(!should_patch_source_range_whitelist(&ingress(disabled)));

        let without_whitelist = r#"
metadata:
  annotations:
    ingress-monitor.bonial.com/enabled: "true"
    nginx.ingress.kubernetes.io/whitelist-source-range: ""
"#;
        assert!(!should_patch_source_range_whitelist(&ingress(without_whitelist)));
        assert!(!should_patch_source_range_whitelist(&Ingress::default()));
    }

    #[test]
    fn whitelist_is_written_back_joined() {
        let mut ingress = ingress("metadata: {annotations: {nginx.ingress.kubernetes.io/whitelist-source-range: '10.0.0.0/8,1.2.3.4/32'}}");
        let mut whitelist = source_range_whitelist(&ingress);
        assert_eq!(whitelist, ranges(&["10.0.0.0/8", "1.2.3.4/32"]));

        whitelist.push("5.6.7.8/32".to_owned());
        set_source_range_whitelist(&mut ingress, &whitelist);

        assert_eq!(
            ingress.metadata.annotations.unwrap()["nginx.ingress.kubernetes.io/whitelist-source-range"],
            "10.0.0.0/8,1.2.3.4/32,5.6.7.8/32"
        );
    }
}
